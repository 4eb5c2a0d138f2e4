//! Stage 2: converts the primitive set into closed polygons, normalized to
//! CCW winding, ready for the Boolean Engine. Primitives that cannot bound
//! an area (bare open arcs/paths) are skipped with a warning rather than
//! fabricated into fictitious geometry.

use crate::config::Config;
use crate::error::Result;
use crate::geometry::{FlashShape, Path, Point, Polarity, Primitive, TraceInterpolation};

/// One closed contour ready for the Boolean Engine, tagged with the
/// polarity of the primitive it came from. Holes carry the same polarity
/// as their enclosing region but CW winding, matching how the chosen fill
/// rule (NonZero/EvenOdd) distinguishes outer contours from holes within
/// one subject group.
#[derive(Debug, Clone)]
pub struct BuiltContour {
    pub path: Path,
    pub polarity: Polarity,
}

pub struct PolygonBuilder {
    /// Maximum chord-to-arc deviation (mm) tolerated when tessellating
    /// circles and curved strokes into straight segments.
    pub tessellation_tolerance: f64,
}

impl PolygonBuilder {
    pub fn new(_config: &Config) -> Self {
        Self {
            tessellation_tolerance: 0.02,
        }
    }

    pub fn build(&self, primitives: &[Primitive]) -> Result<(Vec<BuiltContour>, Vec<String>)> {
        let mut contours = Vec::new();
        let mut warnings = Vec::new();
        for primitive in primitives {
            match self.build_one(primitive) {
                Some(mut built) => contours.append(&mut built),
                None => warnings.push(format!("primitive has no area; skipped: {primitive:?}")),
            }
        }
        Ok((contours, warnings))
    }

    fn circle_segment_count(&self, radius: f64) -> usize {
        let circumference = std::f64::consts::TAU * radius;
        ((circumference / self.tessellation_tolerance).ceil() as usize).max(12)
    }

    fn tessellate_circle(&self, center: Point, radius: f64) -> Vec<Point> {
        let n = self.circle_segment_count(radius);
        (0..n)
            .map(|k| {
                let theta = (k as f64) * std::f64::consts::TAU / (n as f64);
                Point::new(center.x + radius * theta.cos(), center.y + radius * theta.sin())
            })
            .collect()
    }

    fn build_one(&self, primitive: &Primitive) -> Option<Vec<BuiltContour>> {
        match primitive {
            Primitive::Circle { center, radius, polarity } => Some(vec![BuiltContour {
                path: Path::new(self.tessellate_circle(*center, *radius), true),
                polarity: *polarity,
            }]),
            Primitive::Rectangle {
                x,
                y,
                w,
                h,
                polarity,
                ..
            } => Some(vec![BuiltContour {
                path: Path::new(
                    vec![
                        Point::new(*x, *y),
                        Point::new(x + w, *y),
                        Point::new(x + w, y + h),
                        Point::new(*x, y + h),
                    ],
                    true,
                ),
                polarity: *polarity,
            }]),
            Primitive::Arc { .. } => None,
            Primitive::Path { points, closed, polarity } => {
                if !closed || points.len() < 3 {
                    None
                } else {
                    Some(vec![BuiltContour {
                        path: Path::new(points.clone(), true),
                        polarity: *polarity,
                    }])
                }
            }
            Primitive::Trace {
                start,
                end,
                width,
                interpolation,
                polarity,
            } => Some(vec![BuiltContour {
                path: self.stroke_trace(*start, *end, *width, *interpolation),
                polarity: *polarity,
            }]),
            Primitive::Flash { position, shape, polarity } => {
                Some(vec![BuiltContour {
                    path: self.flash_outline(*position, shape),
                    polarity: *polarity,
                }])
            }
            Primitive::Region { points, holes, polarity } => {
                if points.len() < 3 {
                    return None;
                }
                let mut out = vec![BuiltContour {
                    path: Path::new(points.clone(), true).normalized_ccw(),
                    polarity: *polarity,
                }];
                for hole in holes {
                    if hole.len() < 3 {
                        continue;
                    }
                    let mut hole_path = Path::new(hole.clone(), true).normalized_ccw();
                    hole_path.reverse();
                    out.push(BuiltContour {
                        path: hole_path,
                        polarity: *polarity,
                    });
                }
                Some(out)
            }
        }
    }

    /// Build a stadium (linear trace) or swept-stroke (arc trace) outline,
    /// i.e. the stroked shape of `width` along the centerline.
    fn stroke_trace(
        &self,
        start: Point,
        end: Point,
        width: f64,
        interpolation: TraceInterpolation,
    ) -> Path {
        let r = width / 2.0;
        let centerline = match interpolation {
            TraceInterpolation::Linear => vec![start, end],
            TraceInterpolation::Arc { direction, i, j } => {
                self.tessellate_arc(start, end, i, j, direction)
            }
        };
        if centerline.len() < 2 {
            return Path::new(self.tessellate_circle(start, r), true);
        }
        let mut left = Vec::with_capacity(centerline.len());
        let mut right = Vec::with_capacity(centerline.len());
        for i in 0..centerline.len() {
            let prev = if i == 0 { centerline[i] } else { centerline[i - 1] };
            let next = if i + 1 < centerline.len() {
                centerline[i + 1]
            } else {
                centerline[i]
            };
            let dx = next.x - prev.x;
            let dy = next.y - prev.y;
            let len = dx.hypot(dy).max(1e-12);
            let (nx, ny) = (-dy / len, dx / len);
            let p = centerline[i];
            left.push(Point::new(p.x + nx * r, p.y + ny * r));
            right.push(Point::new(p.x - nx * r, p.y - ny * r));
        }
        let start_cap = semicircle_cap(start, left[0], right[0], r);
        let end_cap = semicircle_cap(end, *right.last().unwrap(), *left.last().unwrap(), r);

        let mut outline = Vec::new();
        outline.extend(left.iter().copied());
        outline.extend(end_cap);
        right.reverse();
        outline.extend(right);
        outline.extend(start_cap);
        Path::new(outline, true).normalized_ccw()
    }

    fn tessellate_arc(
        &self,
        start: Point,
        end: Point,
        i: f64,
        j: f64,
        direction: crate::geometry::ArcDirection,
    ) -> Vec<Point> {
        use crate::geometry::ArcDirection;
        let center = Point::new(start.x + i, start.y + j);
        let radius = center.distance(&start);
        if radius < 1e-9 {
            return vec![start, end];
        }
        let start_angle = (start.y - center.y).atan2(start.x - center.x);
        let mut end_angle = (end.y - center.y).atan2(end.x - center.x);
        let ccw = matches!(direction, ArcDirection::CounterClockwise);
        if ccw {
            while end_angle < start_angle {
                end_angle += std::f64::consts::TAU;
            }
        } else {
            while end_angle > start_angle {
                end_angle -= std::f64::consts::TAU;
            }
        }
        let sweep = (end_angle - start_angle).abs();
        let n = ((sweep * radius / self.tessellation_tolerance).ceil() as usize).max(2);
        (0..=n)
            .map(|k| {
                let t = start_angle + (end_angle - start_angle) * (k as f64) / (n as f64);
                Point::new(center.x + radius * t.cos(), center.y + radius * t.sin())
            })
            .collect()
    }

    fn flash_outline(&self, position: Point, shape: &FlashShape) -> Path {
        let points = match shape {
            FlashShape::Circle { diameter } => self.tessellate_circle(position, diameter / 2.0),
            FlashShape::Rect { w, h } => vec![
                Point::new(position.x - w / 2.0, position.y - h / 2.0),
                Point::new(position.x + w / 2.0, position.y - h / 2.0),
                Point::new(position.x + w / 2.0, position.y + h / 2.0),
                Point::new(position.x - w / 2.0, position.y + h / 2.0),
            ],
            FlashShape::Obround { w, h } => self.obround_outline(position, *w, *h),
            FlashShape::Polygon { points } => points
                .iter()
                .map(|p| Point::new(p.x + position.x, p.y + position.y))
                .collect(),
        };
        Path::new(points, true).normalized_ccw()
    }

    fn obround_outline(&self, position: Point, w: f64, h: f64) -> Vec<Point> {
        if w >= h {
            let r = h / 2.0;
            let straight = (w - h).max(0.0) / 2.0;
            let left = Point::new(position.x - straight, position.y);
            let right = Point::new(position.x + straight, position.y);
            let mut pts = self.tessellate_circle(right, r);
            pts.retain(|p| p.x >= right.x - 1e-9);
            let mut left_pts = self.tessellate_circle(left, r);
            left_pts.retain(|p| p.x <= left.x + 1e-9);
            pts.extend(left_pts);
            pts
        } else {
            let r = w / 2.0;
            let straight = (h - w).max(0.0) / 2.0;
            let top = Point::new(position.x, position.y + straight);
            let bottom = Point::new(position.x, position.y - straight);
            let mut pts = self.tessellate_circle(top, r);
            pts.retain(|p| p.y >= top.y - 1e-9);
            let mut bottom_pts = self.tessellate_circle(bottom, r);
            bottom_pts.retain(|p| p.y <= bottom.y + 1e-9);
            pts.extend(bottom_pts);
            pts
        }
    }
}

fn semicircle_cap(center: Point, from: Point, to: Point, radius: f64) -> Vec<Point> {
    let start_angle = (from.y - center.y).atan2(from.x - center.x);
    let mut end_angle = (to.y - center.y).atan2(to.x - center.x);
    while end_angle < start_angle {
        end_angle += std::f64::consts::TAU;
    }
    let n = 8usize;
    (0..=n)
        .map(|k| {
            let t = start_angle + (end_angle - start_angle) * (k as f64) / (n as f64);
            Point::new(center.x + radius * t.cos(), center.y + radius * t.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    fn builder() -> PolygonBuilder {
        PolygonBuilder::new(&Config::default())
    }

    #[test]
    fn linear_trace_forms_a_stadium_of_expected_area() {
        let b = builder();
        let prim = Primitive::Trace {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
            width: 0.2,
            interpolation: TraceInterpolation::Linear,
            polarity: Polarity::Dark,
        };
        let (contours, warnings) = b.build(&[prim]).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(contours.len(), 1);
        let area = contours[0].path.signed_area().abs();
        let expected = 10.0 * 0.2 + std::f64::consts::PI * 0.1 * 0.1;
        assert!((area - expected).abs() / expected < 0.01, "area={area} expected={expected}");
    }

    #[test]
    fn closed_path_is_ccw_normalized() {
        let b = builder();
        let prim = Primitive::Path {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(1.0, 1.0),
                Point::new(1.0, 0.0),
            ],
            closed: true,
            polarity: Polarity::Dark,
        };
        let (contours, _) = b.build(&[prim]).unwrap();
        assert!(contours[0].path.is_ccw());
    }

    #[test]
    fn open_arc_primitive_is_skipped_with_warning() {
        let b = builder();
        let prim = Primitive::Arc {
            start: Point::new(0.0, 0.0),
            end: Point::new(1.0, 0.0),
            center: Point::new(0.5, 0.0),
            clockwise: true,
            polarity: Polarity::Dark,
        };
        let (contours, warnings) = b.build(&[prim]).unwrap();
        assert!(contours.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn region_with_hole_emits_ccw_outer_and_cw_hole() {
        let b = builder();
        let prim = Primitive::Region {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            holes: vec![vec![
                Point::new(2.0, 2.0),
                Point::new(2.0, 4.0),
                Point::new(4.0, 4.0),
                Point::new(4.0, 2.0),
            ]],
            polarity: Polarity::Dark,
        };
        let (contours, _) = b.build(&[prim]).unwrap();
        assert_eq!(contours.len(), 2);
        assert!(contours[0].path.is_ccw());
        assert!(!contours[1].path.is_ccw());
    }

    #[test]
    fn circle_flash_area_approximates_analytic_area() {
        let b = builder();
        let prim = Primitive::Flash {
            position: Point::new(0.0, 0.0),
            shape: FlashShape::Circle { diameter: 1.0 },
            polarity: Polarity::Dark,
        };
        let (contours, _) = b.build(&[prim]).unwrap();
        let area = contours[0].path.signed_area();
        let expected = std::f64::consts::PI * 0.25;
        assert!((area - expected).abs() / expected < 0.01);
    }
}
