//! Stage (F): angle-aware segment simplification. Collapses runs of
//! near-collinear LINEAR commands and demotes arcs whose sagitta is
//! negligible to LINEAR, while never touching a command marked `is_tab`
//! and never merging across a feed-rate, Z, or motion-kind change.
//! Grounded on the teacher's preference for a single forward sweep over a
//! command list (no iterative RDP recursion anywhere in the pack for this
//! kind of 2D polyline).

use crate::config::SimplificationConfig;
use crate::geometry::Point;
use crate::types::{MotionCommand, MotionKind};

fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        return p.distance(&a);
    }
    ((p.x - a.x) * dy - (p.y - a.y) * dx).abs() / len
}

/// Interior angle in degrees at `mid`, where 180 means perfectly straight
/// and smaller values mean a sharper turn.
fn interior_angle_degrees(prev: Point, mid: Point, next: Point) -> f64 {
    let v1 = Point::new(mid.x - prev.x, mid.y - prev.y);
    let v2 = Point::new(next.x - mid.x, next.y - mid.y);
    let len1 = (v1.x * v1.x + v1.y * v1.y).sqrt();
    let len2 = (v2.x * v2.x + v2.y * v2.y).sqrt();
    if len1 < 1e-12 || len2 < 1e-12 {
        return 180.0;
    }
    let cos_theta = ((v1.x * v2.x + v1.y * v2.y) / (len1 * len2)).clamp(-1.0, 1.0);
    180.0 - cos_theta.acos().to_degrees()
}

fn tolerance_for_angle(angle_degrees: f64, config: &SimplificationConfig) -> f64 {
    // `sharp_angle_threshold_degrees` (~150) is a *turn*-angle threshold
    // (§4.4(F): "turn angle > sharpAngleThreshold"); `angle_degrees` here is
    // the interior angle, so a turn > 150 degrees is an interior angle
    // < 180 - 150 = 30 degrees.
    if angle_degrees >= 180.0 - config.straight_angle_threshold_degrees {
        config.straight_tolerance_fallback
    } else if angle_degrees < 180.0 - config.sharp_angle_threshold_degrees {
        config.sharp_corner_tolerance
    } else {
        config.curve_tolerance_fallback
    }
}

/// Demote an arc to a LINEAR command when its sagitta (max deviation of
/// the arc from its chord) is below the curve tolerance: a tessellated
/// near-straight arc costs a controller interpolation for no visible gain.
fn demote_ignorable_arcs(commands: &mut [MotionCommand], start: Point, config: &SimplificationConfig) {
    let mut prev = start;
    for cmd in commands.iter_mut() {
        let endpoint = cmd.xy();
        if let MotionKind::ArcCw { x, y, z, i, j } | MotionKind::ArcCcw { x, y, z, i, j } = cmd.kind {
            let center = Point::new(prev.x + i, prev.y + j);
            let radius = center.distance(&prev);
            let chord = prev.distance(&Point::new(x, y));
            let sagitta = if radius > 1e-9 && chord / 2.0 <= radius {
                radius - (radius * radius - (chord / 2.0) * (chord / 2.0)).sqrt()
            } else {
                radius
            };
            if sagitta <= config.curve_tolerance_fallback {
                cmd.kind = MotionKind::Linear { x, y, z };
            }
        }
        if let Some(p) = endpoint {
            prev = p;
        }
    }
}

/// Remove interior LINEAR vertices whose perpendicular deviation from the
/// chord spanning their neighbors falls under the angle-appropriate
/// tolerance. Tabs, non-LINEAR commands, and feed-rate/Z discontinuities
/// are hard stops that are never merged across.
fn collapse_collinear_runs(commands: Vec<MotionCommand>, start: Point, config: &SimplificationConfig) -> Vec<MotionCommand> {
    if commands.len() < 3 {
        return commands;
    }
    let mut kept: Vec<MotionCommand> = Vec::with_capacity(commands.len());
    let mut anchor = start;
    let mut i = 0;
    while i < commands.len() {
        let cmd = commands[i];
        if !cmd.is_linear() || cmd.is_tab {
            if let Some(p) = cmd.xy() {
                anchor = p;
            }
            kept.push(cmd);
            i += 1;
            continue;
        }

        // Look ahead while the chain stays collinear within tolerance and
        // nothing breaks continuity (feed rate, tab, non-linear kind).
        let mut j = i;
        let mut prev_point = anchor;
        let mut mid_point = cmd.xy().unwrap();
        while j + 1 < commands.len() {
            let next_cmd = commands[j + 1];
            if !next_cmd.is_linear()
                || next_cmd.is_tab
                || next_cmd.feed_rate != cmd.feed_rate
                || next_cmd.z() != cmd.z()
            {
                break;
            }
            let next_point = next_cmd.xy().unwrap();
            let angle = interior_angle_degrees(prev_point, mid_point, next_point);
            let tolerance = tolerance_for_angle(angle, config);
            if perpendicular_distance(mid_point, prev_point, next_point) > tolerance {
                break;
            }
            j += 1;
            mid_point = next_point;
        }

        // Keep only the final command of the run; every interior vertex
        // between `i` and `j` collapses into the straight hop to it.
        kept.push(commands[j]);
        anchor = commands[j].xy().unwrap();
        i = j + 1;
    }
    kept
}

pub fn simplify_commands(commands: Vec<MotionCommand>, start: Point, config: &SimplificationConfig) -> Vec<MotionCommand> {
    let mut commands = commands;
    demote_ignorable_arcs(&mut commands, start, config);
    collapse_collinear_runs(commands, start, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(x: f64, y: f64) -> MotionCommand {
        MotionCommand::new(MotionKind::Linear { x, y, z: -1.0 }, Some(100.0))
    }

    #[test]
    fn collinear_points_on_a_straight_line_collapse_to_one_hop() {
        let config = SimplificationConfig::default();
        let commands = vec![linear(1.0, 0.0), linear(2.0, 0.0), linear(3.0, 0.0), linear(10.0, 0.0)];
        let simplified = simplify_commands(commands, Point::new(0.0, 0.0), &config);
        assert_eq!(simplified.len(), 1);
        assert_eq!(simplified[0].xy(), Some(Point::new(10.0, 0.0)));
    }

    #[test]
    fn a_sharp_corner_is_never_removed() {
        let config = SimplificationConfig::default();
        // Two 90 degree corners: well inside "sharp", must survive even
        // though each individual vertex sits only a few mm from its chord.
        let commands = vec![linear(5.0, 0.0), linear(5.0, 5.0), linear(0.0, 5.0)];
        let simplified = simplify_commands(commands, Point::new(0.0, 0.0), &config);
        assert_eq!(simplified.len(), 3);
    }

    #[test]
    fn a_z_change_terminates_a_collinear_run() {
        let config = SimplificationConfig::default();
        // Same XY line, same feed, but the middle point descends in Z: the
        // intermediate plunge point must survive even though it is
        // collinear in XY with its neighbors.
        let commands = vec![
            linear(1.0, 0.0),
            MotionCommand::new(MotionKind::Linear { x: 2.0, y: 0.0, z: -2.0 }, Some(100.0)),
            linear(3.0, 0.0),
        ];
        let simplified = simplify_commands(commands, Point::new(0.0, 0.0), &config);
        assert_eq!(simplified.len(), 3);
        assert_eq!(simplified[1].z(), Some(-2.0));
    }

    #[test]
    fn a_tab_marked_command_is_never_absorbed_into_a_run() {
        let config = SimplificationConfig::default();
        let mut tab_cmd = linear(5.0, 0.0);
        tab_cmd.is_tab = true;
        let commands = vec![linear(1.0, 0.0), tab_cmd, linear(10.0, 0.0)];
        let simplified = simplify_commands(commands, Point::new(0.0, 0.0), &config);
        assert!(simplified.iter().any(|c| c.is_tab));
        let tab_position = simplified.iter().position(|c| c.is_tab).unwrap();
        assert_eq!(simplified[tab_position].xy(), Some(Point::new(5.0, 0.0)));
    }

    #[test]
    fn a_negligible_sagitta_arc_is_demoted_to_linear() {
        let config = SimplificationConfig::default();
        let commands = vec![MotionCommand::new(
            MotionKind::ArcCcw {
                x: 10.0,
                y: 0.0001,
                z: -1.0,
                i: 0.0,
                j: 5000.0,
            },
            Some(100.0),
        )];
        let simplified = simplify_commands(commands, Point::new(0.0, 0.0), &config);
        assert!(simplified[0].is_linear());
    }
}
