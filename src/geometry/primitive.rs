use super::path::BoundingBox;
use super::point::Point;

/// Dark material is present; clear subtracts from whatever dark material
/// came before it on the same layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Polarity {
    Dark,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceInterpolation {
    Linear,
    Arc {
        direction: ArcDirection,
        /// Arc center offset relative to the trace's start point.
        i: f64,
        j: f64,
    },
}

/// One decoded Gerber feature, in millimeters, with its polarity.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Circle {
        center: Point,
        radius: f64,
        polarity: Polarity,
    },
    Rectangle {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        rotation: f64,
        polarity: Polarity,
    },
    Arc {
        start: Point,
        end: Point,
        center: Point,
        clockwise: bool,
        polarity: Polarity,
    },
    Path {
        points: Vec<Point>,
        closed: bool,
        polarity: Polarity,
    },
    Trace {
        start: Point,
        end: Point,
        width: f64,
        interpolation: TraceInterpolation,
        polarity: Polarity,
    },
    Flash {
        position: Point,
        shape: FlashShape,
        polarity: Polarity,
    },
    Region {
        points: Vec<Point>,
        holes: Vec<Vec<Point>>,
        polarity: Polarity,
    },
}

/// The resolved shape stamped by a flash, already scaled/rotated to its
/// placement (aperture rotation has been applied by the time this is built).
#[derive(Debug, Clone, PartialEq)]
pub enum FlashShape {
    Circle { diameter: f64 },
    Rect { w: f64, h: f64 },
    Obround { w: f64, h: f64 },
    Polygon { points: Vec<Point> },
}

impl Primitive {
    pub fn polarity(&self) -> Polarity {
        match self {
            Primitive::Circle { polarity, .. }
            | Primitive::Rectangle { polarity, .. }
            | Primitive::Arc { polarity, .. }
            | Primitive::Path { polarity, .. }
            | Primitive::Trace { polarity, .. }
            | Primitive::Flash { polarity, .. }
            | Primitive::Region { polarity, .. } => *polarity,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Primitive::Circle { center, radius, .. } => BoundingBox {
                min: Point::new(center.x - radius, center.y - radius),
                max: Point::new(center.x + radius, center.y + radius),
            },
            Primitive::Rectangle {
                x, y, w, h, rotation, ..
            } => {
                let corners = rotated_rect_corners(*x, *y, *w, *h, *rotation);
                BoundingBox::of_points(&corners).expect("rectangle has corners")
            }
            Primitive::Arc { start, end, center, .. } => {
                let r = center.distance(start).max(center.distance(end));
                // Conservative: bound by the full circle of the larger radius.
                BoundingBox {
                    min: Point::new(center.x - r, center.y - r),
                    max: Point::new(center.x + r, center.y + r),
                }
            }
            Primitive::Path { points, .. } => {
                BoundingBox::of_points(points).unwrap_or(BoundingBox {
                    min: Point::new(0.0, 0.0),
                    max: Point::new(0.0, 0.0),
                })
            }
            Primitive::Trace {
                start, end, width, ..
            } => {
                let r = width / 2.0;
                BoundingBox {
                    min: Point::new(start.x.min(end.x) - r, start.y.min(end.y) - r),
                    max: Point::new(start.x.max(end.x) + r, start.y.max(end.y) + r),
                }
            }
            Primitive::Flash {
                position, shape, ..
            } => flash_bounding_box(*position, shape),
            Primitive::Region { points, holes, .. } => {
                let mut all: Vec<Point> = points.clone();
                for h in holes {
                    all.extend(h.iter().copied());
                }
                BoundingBox::of_points(&all).unwrap_or(BoundingBox {
                    min: Point::new(0.0, 0.0),
                    max: Point::new(0.0, 0.0),
                })
            }
        }
    }
}

fn flash_bounding_box(position: Point, shape: &FlashShape) -> BoundingBox {
    match shape {
        FlashShape::Circle { diameter } => {
            let r = diameter / 2.0;
            BoundingBox {
                min: Point::new(position.x - r, position.y - r),
                max: Point::new(position.x + r, position.y + r),
            }
        }
        FlashShape::Rect { w, h } | FlashShape::Obround { w, h } => BoundingBox {
            min: Point::new(position.x - w / 2.0, position.y - h / 2.0),
            max: Point::new(position.x + w / 2.0, position.y + h / 2.0),
        },
        FlashShape::Polygon { points } => {
            let shifted: Vec<Point> = points
                .iter()
                .map(|p| Point::new(p.x + position.x, p.y + position.y))
                .collect();
            BoundingBox::of_points(&shifted).unwrap_or(BoundingBox {
                min: position,
                max: position,
            })
        }
    }
}

fn rotated_rect_corners(x: f64, y: f64, w: f64, h: f64, rotation_degrees: f64) -> Vec<Point> {
    let theta = rotation_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let cx = x + w / 2.0;
    let cy = y + h / 2.0;
    [(-w / 2.0, -h / 2.0), (w / 2.0, -h / 2.0), (w / 2.0, h / 2.0), (-w / 2.0, h / 2.0)]
        .into_iter()
        .map(|(dx, dy)| Point::new(cx + dx * cos - dy * sin, cy + dx * sin + dy * cos))
        .collect()
}

/// A parametric aperture shape, referenced by aperture code from `D` select
/// commands.
#[derive(Debug, Clone, PartialEq)]
pub enum ApertureShape {
    Circle { diameter: f64 },
    Rect { w: f64, h: f64 },
    Obround { w: f64, h: f64 },
    Polygon {
        diameter: f64,
        vertices: u32,
        rotation: f64,
    },
    Macro { name: String, modifiers: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aperture {
    pub code: u32,
    pub shape: ApertureShape,
}

/// One macro primitive statement, codes 1/4/5/20/21/22 per the RS-274X
/// aperture-macro grammar. Arguments are already-evaluated macro
/// expressions (numeric literals or `$n` variable references resolved
/// against the modifiers supplied at `AD` time).
#[derive(Debug, Clone, PartialEq)]
pub enum MacroPrimitive {
    /// code 1: exposure, diameter, center, optional rotation
    Circle {
        exposure: bool,
        diameter: f64,
        center: Point,
        rotation: f64,
    },
    /// code 4: exposure, vertex list (closed), rotation
    Outline {
        exposure: bool,
        points: Vec<Point>,
        rotation: f64,
    },
    /// code 5: exposure, vertex count, center, diameter, rotation
    Polygon {
        exposure: bool,
        vertices: u32,
        center: Point,
        diameter: f64,
        rotation: f64,
    },
    /// code 20: exposure, width, start, end, rotation
    VectorLine {
        exposure: bool,
        width: f64,
        start: Point,
        end: Point,
        rotation: f64,
    },
    /// code 21: exposure, w, h, center, rotation
    CenterLineRect {
        exposure: bool,
        w: f64,
        h: f64,
        center: Point,
        rotation: f64,
    },
    /// code 22: exposure, w, h, lower-left corner, rotation
    LowerLeftRect {
        exposure: bool,
        w: f64,
        h: f64,
        lower_left: Point,
        rotation: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMacro {
    pub name: String,
    pub primitives: Vec<MacroPrimitive>,
    /// The original `,`-delimited statement text behind each entry in
    /// `primitives`, in the same order. Kept so a flash referencing this
    /// macro can re-evaluate `$n` variable references against the
    /// modifiers supplied at `AD` time instead of the all-zero table used
    /// to build `primitives` at macro-definition time.
    pub raw_statements: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_bounding_box_is_centered_square() {
        let c = Primitive::Circle {
            center: Point::new(1.0, 1.0),
            radius: 0.5,
            polarity: Polarity::Dark,
        };
        let bb = c.bounding_box();
        assert_eq!(bb.min, Point::new(0.5, 0.5));
        assert_eq!(bb.max, Point::new(1.5, 1.5));
    }

    #[test]
    fn trace_bounding_box_inflates_by_half_width() {
        let t = Primitive::Trace {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
            width: 0.2,
            interpolation: TraceInterpolation::Linear,
            polarity: Polarity::Dark,
        };
        let bb = t.bounding_box();
        assert!((bb.min.y - (-0.1)).abs() < 1e-9);
        assert!((bb.max.x - 10.1).abs() < 1e-9);
    }
}
