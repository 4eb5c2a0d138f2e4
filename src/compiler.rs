//! Stage 5: converts a per-pass polygon layer (or a drill point) into a
//! `ToolpathPlan` — entry strategy, depth passes, tabs, canned drill
//! cycles, zero-length-draw handling. Grounded on the same path-walking
//! shape the teacher's `profile.rs`/`pocket.rs` use to turn an offset
//! polygon into 3D points, generalized to the richer `MotionCommand` sum
//! type and multi-pass depth stepping this spec requires.

use crate::config::Config;
use crate::error::{PcbCamError, Result};
use crate::geometry::{BoundingBox, Path, Point};
use crate::ids::OperationId;
use crate::offset_generator::OffsetLayer;
use crate::types::{
    CannedCycle, EntryType, MotionCommand, MotionKind, OperationParams, ToolpathPlan,
};

/// A single drill location, the unit the Drill canned-cycle path consumes
/// (peck/chip-break/dwell cycles act on a point, not a polygon).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrillPoint {
    pub position: Point,
    pub diameter: f64,
}

pub struct ToolpathCompiler<'a> {
    config: &'a Config,
}

impl<'a> ToolpathCompiler<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn depth_levels(&self, params: &OperationParams) -> Vec<f64> {
        if !params.multi_depth || params.depth_per_pass <= 0.0 {
            return vec![params.cut_depth];
        }
        let mut levels = Vec::new();
        let mut z = -params.depth_per_pass.abs();
        while z > params.cut_depth {
            levels.push(z);
            z -= params.depth_per_pass.abs();
        }
        levels.push(params.cut_depth);
        levels
    }

    /// Compile every path in an offset layer into one plan each.
    pub fn compile_layer(
        &self,
        layer: &OffsetLayer,
        params: &OperationParams,
        operation_id: OperationId,
    ) -> Result<(Vec<ToolpathPlan>, Vec<String>)> {
        let mut plans = Vec::new();
        let mut warnings = Vec::new();
        for path in &layer.paths {
            if path.points.len() < 3 {
                warnings.push("degenerate offset path (< 3 points) skipped".into());
                continue;
            }
            let plan = self.compile_path(path, params, operation_id, layer.pass, &layer.group_key)?;
            plans.push(plan);
        }
        Ok((plans, warnings))
    }

    fn compile_path(
        &self,
        path: &Path,
        params: &OperationParams,
        operation_id: OperationId,
        pass: usize,
        group_key: &str,
    ) -> Result<ToolpathPlan> {
        let travel_z = self.config.machine_heights.travel_z;
        let levels = self.depth_levels(params);
        let circle = detect_circle(path, self.config.precision.coordinate);

        let mut commands = Vec::new();
        let entry_xy = circle.map(|(c, r)| Point::new(c.x + r, c.y)).unwrap_or(path.points[0]);

        commands.push(MotionCommand::new(
            MotionKind::Rapid {
                x: entry_xy.x,
                y: entry_xy.y,
                z: travel_z,
            },
            None,
        ));

        let mut has_arcs = false;
        let mut loop_range = None;
        for (idx, &level) in levels.iter().enumerate() {
            self.emit_entry(&mut commands, params, entry_xy, level);
            let loop_start = commands.len();
            if let Some((center, radius)) = circle {
                emit_circle(&mut commands, center, radius, entry_xy, level, params.feed_rate);
                has_arcs = true;
            } else {
                emit_loop(&mut commands, path, level, params.feed_rate, self.config.precision.zero_length);
            }
            if idx + 1 == levels.len() {
                loop_range = Some((loop_start, commands.len()));
            }
            commands.push(MotionCommand::new(
                MotionKind::Retract { z: travel_z },
                None,
            ));
        }

        let final_depth = *levels.last().unwrap_or(&params.cut_depth);
        if params.tabs > 0 {
            apply_tabs(&mut commands, params.tabs, params.tab_width, params.tab_height, final_depth);
        }

        let bounding_box = path.bounding_box();
        let exit_xy = commands
            .iter()
            .rev()
            .find_map(|c| c.xy())
            .unwrap_or(entry_xy);

        Ok(ToolpathPlan {
            operation_id,
            commands,
            tool: params.tool,
            entry_point: entry_xy,
            exit_point: exit_xy,
            cut_depth: final_depth,
            feed_rate: params.feed_rate,
            bounding_box,
            is_closed_loop: true,
            is_simple_circle: circle.is_some(),
            has_arcs,
            is_peck_mark: false,
            is_drill_milling: false,
            is_centerline_path: false,
            tool_diameter: params.tool.diameter,
            step_over: params.step_over,
            pass,
            group_key: group_key.to_string(),
            optimization: None,
            loop_range,
        })
    }

    fn emit_entry(&self, commands: &mut Vec<MotionCommand>, params: &OperationParams, entry_xy: Point, level: f64) {
        match params.entry_type {
            EntryType::Plunge => {
                commands.push(MotionCommand::new(
                    MotionKind::Plunge { z: level },
                    Some(params.plunge_rate),
                ));
            }
            EntryType::Ramp => {
                // Descend vertically at the entry point over several steps
                // rather than re-walking the path geometry for the descent;
                // the loop cut at full depth follows immediately after.
                let steps = 8usize;
                for k in 1..=steps {
                    let t = k as f64 / steps as f64;
                    commands.push(MotionCommand::new(
                        MotionKind::Linear {
                            x: entry_xy.x,
                            y: entry_xy.y,
                            z: level * t,
                        },
                        Some(params.plunge_rate),
                    ));
                }
            }
            EntryType::Helix => {
                let radius = 1.5 * params.tool.diameter;
                let turns = 2usize;
                let steps_per_turn = 12usize;
                let total_steps = turns * steps_per_turn;
                let center = Point::new(entry_xy.x - radius, entry_xy.y);
                for k in 1..=total_steps {
                    let t = k as f64 / total_steps as f64;
                    let theta = std::f64::consts::TAU * (k as f64) / (steps_per_turn as f64);
                    let x = center.x + radius * theta.cos();
                    let y = center.y + radius * theta.sin();
                    commands.push(MotionCommand::new(
                        MotionKind::ArcCcw {
                            x,
                            y,
                            z: level * t,
                            i: -radius * (theta - std::f64::consts::TAU / steps_per_turn as f64).cos(),
                            j: -radius * (theta - std::f64::consts::TAU / steps_per_turn as f64).sin(),
                        },
                        Some(params.plunge_rate),
                    ));
                }
                commands.push(MotionCommand::new(
                    MotionKind::Linear {
                        x: entry_xy.x,
                        y: entry_xy.y,
                        z: level,
                    },
                    Some(params.plunge_rate),
                ));
            }
        }
    }

    /// Drill canned cycle for a single point, per the G81/G82/G83/G73
    /// equivalents in the external-interfaces contract.
    pub fn compile_drill(
        &self,
        point: DrillPoint,
        params: &OperationParams,
        operation_id: OperationId,
    ) -> Result<ToolpathPlan> {
        if params.peck_depth < 0.0 {
            return Err(PcbCamError::InvalidParameter("peck depth must be >= 0".into()));
        }
        let travel_z = self.config.machine_heights.travel_z;
        let mut commands = vec![MotionCommand::new(
            MotionKind::Rapid {
                x: point.position.x,
                y: point.position.y,
                z: travel_z,
            },
            None,
        )];

        let target_depth = params.cut_depth;
        let levels: Vec<f64> = match params.canned_cycle {
            CannedCycle::Drill | CannedCycle::DrillWithDwell => vec![target_depth],
            CannedCycle::PeckDrill | CannedCycle::ChipBreak => {
                if params.peck_depth <= 0.0 {
                    vec![target_depth]
                } else {
                    let mut levels = Vec::new();
                    let mut z = -params.peck_depth;
                    while z > target_depth {
                        levels.push(z);
                        z -= params.peck_depth;
                    }
                    levels.push(target_depth);
                    levels
                }
            }
        };

        let dwell_at_bottom = matches!(
            params.canned_cycle,
            CannedCycle::DrillWithDwell | CannedCycle::PeckDrill
        ) || params.dwell_time > 0.0;

        for (idx, &level) in levels.iter().enumerate() {
            commands.push(MotionCommand::new(
                MotionKind::Plunge { z: level },
                Some(params.plunge_rate),
            ));
            if dwell_at_bottom && params.dwell_time > 0.0 {
                commands.push(MotionCommand::new(
                    MotionKind::Dwell {
                        seconds: params.dwell_time,
                    },
                    None,
                ));
            }
            let is_last = idx + 1 == levels.len();
            if !is_last {
                let clearance = match params.canned_cycle {
                    CannedCycle::ChipBreak => level + params.peck_depth * 0.5,
                    _ => params.retract_height,
                };
                commands.push(MotionCommand::new(
                    MotionKind::Retract { z: clearance },
                    None,
                ));
            }
        }
        commands.push(MotionCommand::new(
            MotionKind::Retract { z: travel_z },
            None,
        ));

        Ok(ToolpathPlan {
            operation_id,
            commands,
            tool: params.tool,
            entry_point: point.position,
            exit_point: point.position,
            cut_depth: target_depth,
            feed_rate: params.feed_rate,
            bounding_box: Some(BoundingBox {
                min: point.position,
                max: point.position,
            }),
            is_closed_loop: false,
            is_simple_circle: false,
            has_arcs: false,
            is_peck_mark: true,
            is_drill_milling: false,
            is_centerline_path: false,
            tool_diameter: point.diameter,
            step_over: 1.0,
            pass: 0,
            group_key: format!("{:.6}", point.diameter),
            optimization: None,
            loop_range: None,
        })
    }
}

/// A closed path whose vertices all sit within `tolerance` of a fitted
/// circle is treated as a simple circle so the compiler can emit a true
/// arc pair instead of a dense polyline.
fn detect_circle(path: &Path, tolerance: f64) -> Option<(Point, f64)> {
    let bb = path.bounding_box()?;
    let center = Point::new((bb.min.x + bb.max.x) / 2.0, (bb.min.y + bb.max.y) / 2.0);
    let radius = path.points[0].distance(&center);
    if radius < 1e-9 {
        return None;
    }
    let fit_tolerance = (radius * 0.02).max(tolerance * 100.0);
    let fits = path
        .points
        .iter()
        .all(|p| (p.distance(&center) - radius).abs() <= fit_tolerance);
    if fits {
        Some((center, radius))
    } else {
        None
    }
}

fn emit_circle(commands: &mut Vec<MotionCommand>, center: Point, radius: f64, entry: Point, z: f64, feed: f64) {
    let mid = Point::new(center.x - radius, center.y);
    commands.push(MotionCommand::new(
        MotionKind::ArcCcw {
            x: mid.x,
            y: mid.y,
            z,
            i: center.x - entry.x,
            j: center.y - entry.y,
        },
        Some(feed),
    ));
    commands.push(MotionCommand::new(
        MotionKind::ArcCcw {
            x: entry.x,
            y: entry.y,
            z,
            i: center.x - mid.x,
            j: center.y - mid.y,
        },
        Some(feed),
    ));
}

/// Walk a closed path's vertices as LINEAR commands at a fixed depth.
/// Consecutive points closer than `zero_length` collapse to a
/// flash-equivalent plunge/retract pair rather than a zero-length draw.
fn emit_loop(commands: &mut Vec<MotionCommand>, path: &Path, z: f64, feed: f64, zero_length: f64) {
    let n = path.points.len();
    let mut prev = path.points[0];
    for k in 1..=n {
        let next = path.points[k % n];
        if prev.distance(&next) <= zero_length {
            commands.push(MotionCommand::new(MotionKind::Plunge { z }, Some(feed)));
            commands.push(MotionCommand::new(MotionKind::Retract { z }, Some(feed)));
        } else {
            commands.push(MotionCommand::new(
                MotionKind::Linear {
                    x: next.x,
                    y: next.y,
                    z,
                },
                Some(feed),
            ));
        }
        prev = next;
    }
}

/// Raise Z by `tab_height` across `tab_width`-long arc-length windows at
/// `n` evenly spaced positions around the final pass's perimeter.
fn apply_tabs(commands: &mut [MotionCommand], n: u32, tab_width: f64, tab_height: f64, cut_depth: f64) {
    if n == 0 {
        return;
    }
    let mut cumulative = Vec::with_capacity(commands.len());
    let mut total = 0.0;
    let mut prev = commands.first().and_then(|c| c.xy()).unwrap_or(Point::new(0.0, 0.0));
    for cmd in commands.iter() {
        if let Some(p) = cmd.xy() {
            total += cmd.arc_length_from(prev);
            prev = p;
        }
        cumulative.push(total);
    }
    if total <= 0.0 {
        return;
    }
    let spacing = total / n as f64;
    let tab_z = cut_depth + tab_height;
    for (idx, cmd) in commands.iter_mut().enumerate() {
        let pos = cumulative[idx];
        for slot in 0..n {
            let center = spacing * (slot as f64 + 0.5);
            if (pos - center).abs() <= tab_width / 2.0 {
                if let Some(z) = cmd.z() {
                    if z < tab_z {
                        raise_z(cmd, tab_z);
                    }
                }
                cmd.is_tab = true;
                break;
            }
        }
    }
}

fn raise_z(cmd: &mut MotionCommand, new_z: f64) {
    cmd.kind = match cmd.kind {
        MotionKind::Linear { x, y, .. } => MotionKind::Linear { x, y, z: new_z },
        MotionKind::Rapid { x, y, .. } => MotionKind::Rapid { x, y, z: new_z },
        MotionKind::ArcCw { x, y, i, j, .. } => MotionKind::ArcCw { x, y, z: new_z, i, j },
        MotionKind::ArcCcw { x, y, i, j, .. } => MotionKind::ArcCcw { x, y, z: new_z, i, j },
        MotionKind::Plunge { .. } => MotionKind::Plunge { z: new_z },
        MotionKind::Retract { .. } => MotionKind::Retract { z: new_z },
        MotionKind::Dwell { seconds } => MotionKind::Dwell { seconds },
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OperationId;

    fn square_path(side: f64) -> Path {
        Path::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(side, 0.0),
                Point::new(side, side),
                Point::new(0.0, side),
            ],
            true,
        )
    }

    fn circle_path(radius: f64, n: usize) -> Path {
        let points = (0..n)
            .map(|k| {
                let t = std::f64::consts::TAU * k as f64 / n as f64;
                Point::new(radius * t.cos(), radius * t.sin())
            })
            .collect();
        Path::new(points, true)
    }

    #[test]
    fn compiled_plan_starts_with_rapid_and_ends_with_retract() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let params = OperationParams::default();
        let plan = compiler
            .compile_path(&square_path(5.0), &params, OperationId::new(), 0, "1.000000")
            .unwrap();
        assert!(matches!(plan.commands.first().unwrap().kind, MotionKind::Rapid { .. }));
        assert!(matches!(plan.commands.last().unwrap().kind, MotionKind::Retract { .. }));
    }

    #[test]
    fn circular_offset_path_is_compiled_as_two_arcs() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let params = OperationParams::default();
        let plan = compiler
            .compile_path(&circle_path(2.0, 48), &params, OperationId::new(), 0, "1.000000")
            .unwrap();
        assert!(plan.is_simple_circle);
        assert!(plan.has_arcs);
        let arc_count = plan.commands.iter().filter(|c| c.is_arc()).count();
        assert_eq!(arc_count, 2);
    }

    #[test]
    fn multi_depth_produces_one_level_group_per_pass() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let mut params = OperationParams::default();
        params.multi_depth = true;
        params.depth_per_pass = 0.5;
        params.cut_depth = -1.2;
        let plan = compiler
            .compile_path(&square_path(5.0), &params, OperationId::new(), 0, "1.000000")
            .unwrap();
        let retract_count = plan
            .commands
            .iter()
            .filter(|c| matches!(c.kind, MotionKind::Retract { .. }))
            .count();
        assert_eq!(retract_count, 3);
        assert!((plan.cut_depth - (-1.2)).abs() < 1e-9);
    }

    #[test]
    fn tabs_raise_z_and_mark_is_tab_without_changing_xy() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let mut params = OperationParams::default();
        params.tabs = 4;
        params.tab_width = 0.5;
        params.tab_height = 1.0;
        params.cut_depth = -1.0;
        let plan = compiler
            .compile_path(&square_path(20.0), &params, OperationId::new(), 0, "1.000000")
            .unwrap();
        let tabs: Vec<_> = plan.commands.iter().filter(|c| c.is_tab).collect();
        assert!(!tabs.is_empty());
        for tab in &tabs {
            assert!(tab.z().unwrap() > plan.cut_depth);
        }
    }

    #[test]
    fn peck_drill_produces_three_interim_retracts_for_scenario_six() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let mut params = OperationParams::default();
        params.cut_depth = -1.8;
        params.peck_depth = 0.6;
        params.canned_cycle = CannedCycle::PeckDrill;
        params.retract_height = 0.5;
        let plan = compiler
            .compile_drill(
                DrillPoint {
                    position: Point::new(5.0, 5.0),
                    diameter: 1.0,
                },
                &params,
                OperationId::new(),
            )
            .unwrap();
        let plunges: Vec<f64> = plan
            .commands
            .iter()
            .filter_map(|c| match c.kind {
                MotionKind::Plunge { z } => Some(z),
                _ => None,
            })
            .collect();
        assert_eq!(plunges.len(), 3);
        assert!((plunges[0] - (-0.6)).abs() < 1e-9);
        assert!((plunges[1] - (-1.2)).abs() < 1e-9);
        assert!((plunges[2] - (-1.8)).abs() < 1e-9);
        assert!(plan.is_peck_mark);
    }

    #[test]
    fn drill_never_requests_rotation() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let params = OperationParams::default();
        let plan = compiler
            .compile_drill(
                DrillPoint {
                    position: Point::new(0.0, 0.0),
                    diameter: 1.0,
                },
                &params,
                OperationId::new(),
            )
            .unwrap();
        assert!(plan.is_rotation_forbidden());
    }

    #[test]
    fn negative_peck_depth_is_rejected() {
        let config = Config::default();
        let compiler = ToolpathCompiler::new(&config);
        let mut params = OperationParams::default();
        params.peck_depth = -1.0;
        let err = compiler
            .compile_drill(
                DrillPoint {
                    position: Point::new(0.0, 0.0),
                    diameter: 1.0,
                },
                &params,
                OperationId::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PcbCamError::InvalidParameter(_)));
    }
}
