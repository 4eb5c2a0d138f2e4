//! Stage (C): builds staydown clusters, connected components of plans at
//! the same Z level whose geometry sits close enough that the tool could
//! hop between them without retracting. Grounded on the same
//! `build_poly_tree` containment-by-proximity shape the Boolean Engine
//! uses to group polygons, generalized here from point-in-polygon to
//! AABB-plus-sampled-point distance.

use crate::config::Config;
use crate::geometry::Point;
use crate::types::{Cluster, ToolpathPlan};
use itertools::Itertools;

const MAX_SAMPLE_POINTS: usize = 20;

/// The longest air hop a staydown link within a cluster may span: the
/// tool's own step distance (`d·(1−s)`, matching
/// `offset_generator::deltas`'s pass-to-pass step) plus the configured
/// slack. §4.4(C) also allows the tolerance term to be `0.1·d` instead of
/// a flat configured value; `config.staydown_tolerance` is used here as
/// the simpler, caller-tunable form since the spec treats the two as
/// interchangeable "small tolerance" options.
pub fn staydown_margin(plan: &ToolpathPlan, config: &Config) -> f64 {
    plan.tool_diameter * (1.0 - plan.step_over).max(0.01) + config.staydown_tolerance
}

fn sample_points(plan: &ToolpathPlan) -> Vec<Point> {
    let xy: Vec<Point> = plan.commands.iter().filter_map(|c| c.xy()).collect();
    if xy.len() <= MAX_SAMPLE_POINTS {
        return xy;
    }
    let stride = xy.len() as f64 / MAX_SAMPLE_POINTS as f64;
    (0..MAX_SAMPLE_POINTS)
        .map(|i| xy[((i as f64 * stride) as usize).min(xy.len() - 1)])
        .collect()
}

fn within_margin(a: &ToolpathPlan, b: &ToolpathPlan, margin: f64) -> bool {
    if let (Some(bb_a), Some(bb_b)) = (a.bounding_box, b.bounding_box) {
        if !bb_a.inflated(margin).intersects(&bb_b.inflated(margin)) {
            return false;
        }
    }
    let pa = sample_points(a);
    let pb = sample_points(b);
    pa.iter().any(|p| pb.iter().any(|q| p.distance(q) <= margin))
}

/// Partition `plans` (already filtered to one tool/Z group) into connected
/// components via DFS over a proximity graph. Order within each cluster is
/// not yet decided here; that is stage (D)'s job.
pub fn build_clusters(plans: Vec<ToolpathPlan>, config: &Config) -> Vec<Cluster> {
    let n = plans.len();
    if n == 0 {
        return Vec::new();
    }
    let margins: Vec<f64> = plans.iter().map(|p| staydown_margin(p, config)).collect();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, j) in (0..n).tuple_combinations() {
        let margin = margins[i].max(margins[j]);
        if within_margin(&plans[i], &plans[j], margin) {
            adjacency[i].push(j);
            adjacency[j].push(i);
        }
    }

    let mut visited = vec![false; n];
    let mut slots: Vec<Option<ToolpathPlan>> = plans.into_iter().map(Some).collect();
    let mut clusters = Vec::new();
    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut stack = vec![start];
        visited[start] = true;
        let mut component = Vec::new();
        while let Some(node) = stack.pop() {
            component.push(node);
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        component.sort_unstable();
        let members: Vec<ToolpathPlan> = component
            .into_iter()
            .map(|i| slots[i].take().expect("each index visited once"))
            .collect();
        clusters.push(Cluster::from_plans(members));
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::ids::OperationId;
    use crate::types::{MotionCommand, MotionKind, Tool, ToolType};

    fn plan_at(x: f64, y: f64) -> ToolpathPlan {
        let commands = vec![
            MotionCommand::new(MotionKind::Rapid { x, y, z: 2.0 }, None),
            MotionCommand::new(MotionKind::Plunge { z: -1.0 }, Some(100.0)),
            MotionCommand::new(MotionKind::Retract { z: 2.0 }, None),
        ];
        ToolpathPlan {
            operation_id: OperationId::new(),
            commands,
            tool: Tool {
                diameter: 1.0,
                tool_type: ToolType::Endmill,
            },
            entry_point: Point::new(x, y),
            exit_point: Point::new(x, y),
            cut_depth: -1.0,
            feed_rate: 100.0,
            bounding_box: Some(BoundingBox {
                min: Point::new(x, y),
                max: Point::new(x, y),
            }),
            is_closed_loop: false,
            is_simple_circle: false,
            has_arcs: false,
            is_peck_mark: true,
            is_drill_milling: false,
            is_centerline_path: false,
            tool_diameter: 1.0,
            step_over: 0.5,
            pass: 0,
            group_key: "1.000000".into(),
            optimization: None,
            loop_range: None,
        }
    }

    #[test]
    fn three_pads_within_reach_form_one_cluster() {
        let config = Config::default();
        let plans = vec![plan_at(0.0, 0.0), plan_at(1.0, 0.0), plan_at(2.0, 0.0)];
        let clusters = build_clusters(plans, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].plans.len(), 3);
    }

    #[test]
    fn a_far_pad_forms_its_own_cluster() {
        let config = Config::default();
        let plans = vec![plan_at(0.0, 0.0), plan_at(1.0, 0.0), plan_at(500.0, 500.0)];
        let clusters = build_clusters(plans, &config);
        assert_eq!(clusters.len(), 2);
        let sizes: Vec<usize> = clusters.iter().map(|c| c.plans.len()).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }
}
