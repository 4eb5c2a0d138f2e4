//! Stage 7: walks a finalized plan with a running position, recomputing
//! bounding box, total travel, and estimated execution time from the
//! command stream itself rather than trusting whatever the compiler or
//! optimizer last wrote — rotation, tab insertion, and simplification all
//! touch the commands, so the numbers callers read must be derived after
//! all of that has happened.

use crate::config::Config;
use crate::geometry::{BoundingBox, Point};
use crate::types::{MotionCommand, MotionKind, ToolpathPlan};

/// Recomputed, authoritative numbers for one plan. `bounding_box` covers
/// XY only (the shared `BoundingBox` type is 2D, as everywhere else in
/// this crate); `z_min`/`z_max` carry the vertical extent separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanMetadata {
    pub total_distance_mm: f64,
    pub estimated_time_seconds: f64,
    pub bounding_box: Option<BoundingBox>,
    pub z_min: Option<f64>,
    pub z_max: Option<f64>,
}

/// Aggregated across every plan in a finished operation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OperationMetadata {
    pub total_distance_mm: f64,
    pub estimated_time_seconds: f64,
    pub bounding_box: Option<BoundingBox>,
    pub z_min: Option<f64>,
    pub z_max: Option<f64>,
}

pub struct MetadataCalculator<'a> {
    config: &'a Config,
}

impl<'a> MetadataCalculator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Walk one plan's commands, accumulating distance, time, and extent.
    /// Arc length uses `MotionCommand::arc_length_from`, the same radius
    /// times swept-angle approximation the compiler's tab-window spacing
    /// already relies on, so a plan's reported travel matches the distance
    /// tabs are actually spaced along.
    pub fn calculate(&self, plan: &ToolpathPlan) -> PlanMetadata {
        let mut total_distance = 0.0;
        let mut estimated_time = 0.0;
        let mut bbox: Option<BoundingBox> = None;
        let mut z_min: Option<f64> = None;
        let mut z_max: Option<f64> = None;

        let mut cursor = plan.entry_point;
        absorb(&mut bbox, cursor);
        absorb_z(&mut z_min, &mut z_max, None);

        for cmd in &plan.commands {
            let length = cmd.arc_length_from(cursor);
            total_distance += length;
            estimated_time += length / self.feed_for(cmd) * 60.0;
            if let MotionKind::Dwell { seconds } = cmd.kind {
                estimated_time += seconds;
            }
            if let Some(xy) = cmd.xy() {
                cursor = xy;
                absorb(&mut bbox, cursor);
            }
            absorb_z(&mut z_min, &mut z_max, cmd.z());
        }

        PlanMetadata {
            total_distance_mm: total_distance,
            estimated_time_seconds: estimated_time,
            bounding_box: bbox,
            z_min,
            z_max,
        }
    }

    /// Rapids carry no feed rate of their own (the controller moves them
    /// at the machine's maximum), so they're charged the configured
    /// rapid-feed default; every other command uses its own feed.
    fn feed_for(&self, cmd: &MotionCommand) -> f64 {
        match cmd.kind {
            MotionKind::Rapid { .. } => self.config.machine_heights.rapid_feed,
            _ => cmd
                .feed_rate
                .filter(|f| *f > 0.0)
                .unwrap_or(self.config.machine_heights.rapid_feed),
        }
    }

    pub fn calculate_operation(&self, plans: &[ToolpathPlan]) -> OperationMetadata {
        let mut acc = OperationMetadata::default();
        for plan in plans {
            let m = self.calculate(plan);
            acc.total_distance_mm += m.total_distance_mm;
            acc.estimated_time_seconds += m.estimated_time_seconds;
            acc.bounding_box = match (acc.bounding_box, m.bounding_box) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (Some(a), None) => Some(a),
                (None, b) => b,
            };
            acc.z_min = min_opt(acc.z_min, m.z_min);
            acc.z_max = max_opt(acc.z_max, m.z_max);
        }
        acc
    }
}

fn absorb(bbox: &mut Option<BoundingBox>, point: Point) {
    let single = BoundingBox { min: point, max: point };
    *bbox = Some(match bbox {
        Some(existing) => existing.union(&single),
        None => single,
    });
}

fn absorb_z(z_min: &mut Option<f64>, z_max: &mut Option<f64>, z: Option<f64>) {
    if let Some(z) = z {
        *z_min = Some(z_min.map_or(z, |m| m.min(z)));
        *z_max = Some(z_max.map_or(z, |m| m.max(z)));
    }
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}
