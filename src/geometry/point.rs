/// A point in millimeters at the machine layer.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn distance_sqr(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Convert to the boolean engine's fixed-point integer units.
    pub fn to_fixed(&self, scale: f64) -> FixedPoint {
        FixedPoint {
            x: (self.x * scale).round() as i64,
            y: (self.y * scale).round() as i64,
        }
    }
}

/// A point in integer clipping units, used only by the Boolean Engine and
/// Offset Generator. `scale` (units per millimeter) is carried alongside by
/// the caller, never implied by the type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedPoint {
    pub x: i64,
    pub y: i64,
}

impl FixedPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn to_point(&self, scale: f64) -> Point {
        Point {
            x: self.x as f64 / scale,
            y: self.y as f64 / scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_point_round_trip_within_half_unit() {
        let scale = 100_000.0;
        let p = Point::new(1.23456, -7.891011);
        let fp = p.to_fixed(scale);
        let back = fp.to_point(scale);
        assert!((back.x - p.x).abs() < 1.0 / scale);
        assert!((back.y - p.y).abs() < 1.0 / scale);
    }
}
