//! Shared data model for the Toolpath Compiler and Optimizer: motion
//! commands as a tagged sum type (never a sparse record with optional
//! fields — see the re-architecture guidance this crate follows), the
//! per-operation tool/config surface, and the plan/cluster/statistics
//! types the optimizer owns during its pass.

use crate::geometry::{BoundingBox, Point};
use crate::ids::OperationId;
use serde::{Deserialize, Serialize};

/// The geometric shape of a tool, independent of its diameter where the
/// shape itself carries geometry (a V-bit's cutting width is a function of
/// depth, not a single diameter).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ToolType {
    Endmill,
    VBit { angle_degrees: f64 },
    Ballnose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub diameter: f64,
    pub tool_type: ToolType,
}

impl Tool {
    /// The `groupKey` the optimizer partitions by: the tool diameter as a
    /// string, per the spec's own description of the field. A string key
    /// (rather than a float) sidesteps float-equality pitfalls when the
    /// same nominal diameter is specified twice across operations.
    pub fn group_key(&self) -> String {
        format!("{:.6}", self.diameter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MillingDirection {
    Climb,
    Conventional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Plunge,
    Ramp,
    Helix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutSide {
    Outside,
    Inside,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CannedCycle {
    /// G81: simple drill, no dwell, no peck.
    Drill,
    /// G82: drill with dwell at the bottom.
    DrillWithDwell,
    /// G83: peck drill, full retract between pecks.
    PeckDrill,
    /// G73: high-speed peck, partial retract between pecks.
    ChipBreak,
}

/// Per-operation parameters, mirroring the abstract CLI/config surface's
/// per-operation tool/passes/stepover/.../millHoles field list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationParams {
    pub tool: Tool,
    pub passes: u32,
    pub step_over: f64,
    pub cut_depth: f64,
    pub depth_per_pass: f64,
    pub multi_depth: bool,
    pub feed_rate: f64,
    pub plunge_rate: f64,
    pub spindle_speed: f64,
    pub direction: MillingDirection,
    pub entry_type: EntryType,
    pub tabs: u32,
    pub tab_width: f64,
    pub tab_height: f64,
    pub canned_cycle: CannedCycle,
    pub peck_depth: f64,
    pub dwell_time: f64,
    pub retract_height: f64,
    pub cut_side: CutSide,
    pub mill_holes: bool,
}

impl Default for OperationParams {
    fn default() -> Self {
        Self {
            tool: Tool {
                diameter: 1.0,
                tool_type: ToolType::Endmill,
            },
            passes: 1,
            step_over: 0.5,
            cut_depth: -1.0,
            depth_per_pass: 1.0,
            multi_depth: false,
            feed_rate: 800.0,
            plunge_rate: 200.0,
            spindle_speed: 10_000.0,
            direction: MillingDirection::Conventional,
            entry_type: EntryType::Plunge,
            tabs: 0,
            tab_width: 2.0,
            tab_height: 0.5,
            canned_cycle: CannedCycle::Drill,
            peck_depth: 0.0,
            dwell_time: 0.0,
            retract_height: 2.0,
            cut_side: CutSide::Outside,
            mill_holes: false,
        }
    }
}

/// One resolved motion step. Absolute coordinates only: the "maintain
/// previous axis" sparse-field convention of the source format is
/// resolved against a running position before a command is ever
/// constructed, so every variant here carries fully-determined fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionKind {
    Rapid { x: f64, y: f64, z: f64 },
    Linear { x: f64, y: f64, z: f64 },
    Plunge { z: f64 },
    Retract { z: f64 },
    ArcCw { x: f64, y: f64, z: f64, i: f64, j: f64 },
    ArcCcw { x: f64, y: f64, z: f64, i: f64, j: f64 },
    Dwell { seconds: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub kind: MotionKind,
    pub feed_rate: Option<f64>,
    /// Marks a semantic tab break. Simplification must preserve a command
    /// with this flag set bit-for-bit, never merging or dropping it.
    pub is_tab: bool,
}

impl MotionCommand {
    pub fn new(kind: MotionKind, feed_rate: Option<f64>) -> Self {
        Self {
            kind,
            feed_rate,
            is_tab: false,
        }
    }

    pub fn tab(mut self) -> Self {
        self.is_tab = true;
        self
    }

    /// The resolved XY position this command ends at, if it has one.
    /// `Dwell` has no spatial component and returns `None`.
    pub fn xy(&self) -> Option<Point> {
        match self.kind {
            MotionKind::Rapid { x, y, .. }
            | MotionKind::Linear { x, y, .. }
            | MotionKind::ArcCw { x, y, .. }
            | MotionKind::ArcCcw { x, y, .. } => Some(Point::new(x, y)),
            MotionKind::Plunge { .. } | MotionKind::Retract { .. } | MotionKind::Dwell { .. } => {
                None
            }
        }
    }

    pub fn z(&self) -> Option<f64> {
        match self.kind {
            MotionKind::Rapid { z, .. }
            | MotionKind::Linear { z, .. }
            | MotionKind::ArcCw { z, .. }
            | MotionKind::ArcCcw { z, .. }
            | MotionKind::Plunge { z }
            | MotionKind::Retract { z } => Some(z),
            MotionKind::Dwell { .. } => None,
        }
    }

    pub fn is_arc(&self) -> bool {
        matches!(self.kind, MotionKind::ArcCw { .. } | MotionKind::ArcCcw { .. })
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.kind, MotionKind::Linear { .. })
    }

    pub fn is_rapid(&self) -> bool {
        matches!(self.kind, MotionKind::Rapid { .. })
    }

    /// Arc-length approximation: exact for arcs (radius * swept angle),
    /// Euclidean for everything else that has an XY displacement.
    pub fn arc_length_from(&self, prev: Point) -> f64 {
        match self.kind {
            MotionKind::ArcCw { x, y, i, j, .. } | MotionKind::ArcCcw { x, y, i, j, .. } => {
                let center = Point::new(prev.x + i, prev.y + j);
                let radius = center.distance(&prev);
                if radius < 1e-9 {
                    return prev.distance(&Point::new(x, y));
                }
                let end = Point::new(x, y);
                let start_angle = (prev.y - center.y).atan2(prev.x - center.x);
                let end_angle = (end.y - center.y).atan2(end.x - center.x);
                let cw = matches!(self.kind, MotionKind::ArcCw { .. });
                let mut sweep = end_angle - start_angle;
                if cw {
                    while sweep > 0.0 {
                        sweep -= std::f64::consts::TAU;
                    }
                } else {
                    while sweep < 0.0 {
                        sweep += std::f64::consts::TAU;
                    }
                }
                radius * sweep.abs()
            }
            _ => match self.xy() {
                Some(p) => prev.distance(&p),
                None => 0.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Staydown,
    Rapid,
}

/// Recorded once entry rotation and linking are decided for a plan; absent
/// on a plan that has not yet been touched by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub link_type: LinkType,
    pub original_entry_point: Point,
    pub optimized_entry_point: Point,
    pub entry_command_index: usize,
}

/// One compiled, orderable unit of machining: a sequence of resolved
/// motion commands plus the metadata the optimizer reads and, on its
/// second pass, writes back (`optimization`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolpathPlan {
    pub operation_id: OperationId,
    pub commands: Vec<MotionCommand>,
    pub tool: Tool,
    pub entry_point: Point,
    pub exit_point: Point,
    pub cut_depth: f64,
    pub feed_rate: f64,
    pub bounding_box: Option<BoundingBox>,
    pub is_closed_loop: bool,
    pub is_simple_circle: bool,
    pub has_arcs: bool,
    pub is_peck_mark: bool,
    pub is_drill_milling: bool,
    pub is_centerline_path: bool,
    pub tool_diameter: f64,
    pub step_over: f64,
    pub pass: usize,
    pub group_key: String,
    pub optimization: Option<OptimizationRecord>,
    /// Half-open `[start, end)` index range within `commands` holding the
    /// final depth level's cut-loop motions, set by the compiler so the
    /// optimizer can rotate the loop's start without having to infer the
    /// boundary from command kinds alone. `None` for non-loop plans (drill
    /// cycles, open paths).
    pub loop_range: Option<(usize, usize)>,
}

impl ToolpathPlan {
    /// True for plans the optimizer must never rotate: drill cycles have
    /// no meaningful "entry point on the loop" and centerline passes are a
    /// single directed stroke, not a closed boundary.
    pub fn is_rotation_forbidden(&self) -> bool {
        self.is_peck_mark || self.is_drill_milling || self.is_centerline_path
    }

    /// Rotate the final pass's cut loop to begin at the vertex `local_index`
    /// steps after the current start, retargeting every pre-loop command
    /// that sits at the old entry point so the tool actually arrives where
    /// the rotated loop now begins. A no-op on plans with no `loop_range`.
    pub fn rotate_loop_to_vertex(&mut self, local_index: usize) {
        let Some((start, end)) = self.loop_range else {
            return;
        };
        let n = end - start;
        if n == 0 || local_index % n == 0 {
            return;
        }
        let offset = local_index % n;
        let rotated: Vec<MotionCommand> = (0..n).map(|i| self.commands[start + (offset + i) % n]).collect();
        self.commands[start..end].clone_from_slice(&rotated);

        let old_entry = self.entry_point;
        let new_entry = self.commands[end - 1].xy().unwrap_or(old_entry);
        for cmd in self.commands[..start].iter_mut() {
            if let Some(xy) = cmd.xy() {
                if xy.distance(&old_entry) < 1e-6 {
                    set_xy(cmd, new_entry);
                }
            }
        }
        self.entry_point = new_entry;
        self.exit_point = new_entry;
    }

    /// Repair missing/degenerate entry or exit points by substituting the
    /// coordinates of the first/last command, per the optimizer's
    /// never-fail-on-bad-metadata policy.
    pub fn repair_endpoints(&mut self) {
        if let Some(first) = self.commands.first().and_then(|c| c.xy()) {
            if !self.entry_point.x.is_finite() || !self.entry_point.y.is_finite() {
                self.entry_point = first;
            }
        }
        if let Some(last) = self.commands.last().and_then(|c| c.xy()) {
            if !self.exit_point.x.is_finite() || !self.exit_point.y.is_finite() {
                self.exit_point = last;
            }
        }
    }
}

fn set_xy(cmd: &mut MotionCommand, xy: Point) {
    cmd.kind = match cmd.kind {
        MotionKind::Linear { z, .. } => MotionKind::Linear { x: xy.x, y: xy.y, z },
        MotionKind::Rapid { z, .. } => MotionKind::Rapid { x: xy.x, y: xy.y, z },
        MotionKind::ArcCw { z, i, j, .. } => MotionKind::ArcCw { x: xy.x, y: xy.y, z, i, j },
        MotionKind::ArcCcw { z, i, j, .. } => MotionKind::ArcCcw { x: xy.x, y: xy.y, z, i, j },
        other @ (MotionKind::Plunge { .. } | MotionKind::Retract { .. } | MotionKind::Dwell { .. }) => other,
    };
}

/// A connected component of plans at the same Z linked by feasible
/// staydown hops, built during optimizer stage (C).
#[derive(Debug, Clone)]
pub struct Cluster {
    pub plans: Vec<ToolpathPlan>,
    pub entry_point: Point,
    pub exit_point: Point,
}

impl Cluster {
    pub fn from_plans(plans: Vec<ToolpathPlan>) -> Self {
        let entry_point = plans.first().map(|p| p.entry_point).unwrap_or(Point::new(0.0, 0.0));
        let exit_point = plans.last().map(|p| p.exit_point).unwrap_or(Point::new(0.0, 0.0));
        Self {
            plans,
            entry_point,
            exit_point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Ok,
    Warning,
    Error,
}

/// Per-operation partial-success report, mirroring the status/warnings/
/// error shape this crate's teacher uses for toolpath generation reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation_id: OperationId,
    pub status: OperationStatus,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl OperationReport {
    pub fn ok(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Ok,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        if !warnings.is_empty() {
            self.status = OperationStatus::Warning;
        }
        self.warnings.extend(warnings);
        self
    }

    pub fn failed(operation_id: OperationId, error: impl Into<String>) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Error,
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Always produced by the optimizer, whether or not there was anything
/// interesting to optimize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizerStatistics {
    pub paths_ordered: usize,
    pub clusters_found: usize,
    pub staydown_links_used: usize,
    pub rapid_links_used: usize,
    pub original_travel_mm: f64,
    pub optimized_travel_mm: f64,
    pub points_removed: usize,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_key_is_stable_for_equal_diameters() {
        let a = Tool {
            diameter: 0.2,
            tool_type: ToolType::Endmill,
        };
        let b = Tool {
            diameter: 0.2,
            tool_type: ToolType::Endmill,
        };
        assert_eq!(a.group_key(), b.group_key());
    }

    #[test]
    fn tab_flag_survives_copy_and_clone() {
        let cmd = MotionCommand::new(MotionKind::Linear { x: 1.0, y: 1.0, z: -1.0 }, Some(100.0)).tab();
        let copied = cmd;
        assert!(copied.is_tab);
    }

    #[test]
    fn arc_length_of_quarter_circle_is_radius_times_half_pi() {
        let prev = Point::new(1.0, 0.0);
        let cmd = MotionCommand::new(
            MotionKind::ArcCcw {
                x: 0.0,
                y: 1.0,
                z: 0.0,
                i: -1.0,
                j: 0.0,
            },
            None,
        );
        let length = cmd.arc_length_from(prev);
        assert!((length - std::f64::consts::FRAC_PI_2).abs() < 1e-6, "length={length}");
    }

    #[test]
    fn repair_endpoints_substitutes_first_and_last_command() {
        let mut plan = ToolpathPlan {
            operation_id: OperationId::new(),
            commands: vec![
                MotionCommand::new(MotionKind::Rapid { x: 1.0, y: 2.0, z: 5.0 }, None),
                MotionCommand::new(MotionKind::Linear { x: 3.0, y: 4.0, z: -1.0 }, Some(100.0)),
            ],
            tool: Tool {
                diameter: 1.0,
                tool_type: ToolType::Endmill,
            },
            entry_point: Point::new(f64::NAN, f64::NAN),
            exit_point: Point::new(f64::NAN, f64::NAN),
            cut_depth: -1.0,
            feed_rate: 100.0,
            bounding_box: None,
            is_closed_loop: false,
            is_simple_circle: false,
            has_arcs: false,
            is_peck_mark: false,
            is_drill_milling: false,
            is_centerline_path: false,
            tool_diameter: 1.0,
            step_over: 0.5,
            pass: 0,
            group_key: "1.000000".into(),
            optimization: None,
            loop_range: None,
        };
        plan.repair_endpoints();
        assert_eq!(plan.entry_point, Point::new(1.0, 2.0));
        assert_eq!(plan.exit_point, Point::new(3.0, 4.0));
    }

    #[test]
    fn rotate_loop_to_vertex_retargets_entry_and_closes_back_to_new_start() {
        let mut plan = ToolpathPlan {
            operation_id: OperationId::new(),
            commands: vec![
                MotionCommand::new(MotionKind::Rapid { x: 0.0, y: 0.0, z: 5.0 }, None),
                MotionCommand::new(MotionKind::Plunge { z: -1.0 }, Some(100.0)),
                MotionCommand::new(MotionKind::Linear { x: 10.0, y: 0.0, z: -1.0 }, Some(100.0)),
                MotionCommand::new(MotionKind::Linear { x: 10.0, y: 10.0, z: -1.0 }, Some(100.0)),
                MotionCommand::new(MotionKind::Linear { x: 0.0, y: 10.0, z: -1.0 }, Some(100.0)),
                MotionCommand::new(MotionKind::Linear { x: 0.0, y: 0.0, z: -1.0 }, Some(100.0)),
                MotionCommand::new(MotionKind::Retract { z: 5.0 }, None),
            ],
            tool: Tool {
                diameter: 1.0,
                tool_type: ToolType::Endmill,
            },
            entry_point: Point::new(0.0, 0.0),
            exit_point: Point::new(0.0, 0.0),
            cut_depth: -1.0,
            feed_rate: 100.0,
            bounding_box: None,
            is_closed_loop: true,
            is_simple_circle: false,
            has_arcs: false,
            is_peck_mark: false,
            is_drill_milling: false,
            is_centerline_path: false,
            tool_diameter: 1.0,
            step_over: 0.5,
            pass: 0,
            group_key: "1.000000".into(),
            optimization: None,
            loop_range: Some((2, 6)),
        };
        plan.rotate_loop_to_vertex(2);
        assert_eq!(plan.entry_point, Point::new(10.0, 10.0));
        assert_eq!(plan.exit_point, Point::new(10.0, 10.0));
        if let MotionKind::Rapid { x, y, .. } = plan.commands[0].kind {
            assert_eq!((x, y), (10.0, 10.0));
        } else {
            panic!("expected rapid as first command");
        }
        assert_eq!(plan.commands[5].xy(), Some(Point::new(10.0, 10.0)));
    }
}
