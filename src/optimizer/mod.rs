//! Stage 6 (the core of the core): six-stage pipeline that reorders and
//! simplifies compiled plans for minimum travel without changing what
//! they cut. Grounded on the teacher's `toolpath_generation.rs`
//! per-operation orchestration (iterate, collect a report, never abort
//! the whole batch on one bad plan) generalized from "one pass per
//! operation" to "one ordering pass per tool/Z group, one cluster at a
//! time".
//!
//! (A) group by tool groupKey
//! (B) optionally split each group further by rounded Z level
//! (C) build staydown clusters within each group ([`cluster`])
//! (D) order plans inside each cluster, rotating closed-loop entries
//!     where it pays off ([`order::order_cluster`])
//! (E) order clusters against each other, staydown never legal across a
//!     cluster boundary ([`order::order_clusters`])
//! (F) simplify every plan's command stream ([`simplify`])
//!
//! No 2-opt or other local-search refinement runs after stage (D)/(E):
//! a single greedy nearest-neighbor sweep per group is the whole of the
//! ordering strategy.

pub mod cluster;
pub mod order;
pub mod simplify;

use std::collections::BTreeMap;

use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::error::{PcbCamError, Result};
use crate::geometry::Point;
use crate::types::{Cluster, OptimizerStatistics, ToolpathPlan};

pub struct Optimizer<'a> {
    config: &'a Config,
}

impl<'a> Optimizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn optimize(
        &self,
        mut plans: Vec<ToolpathPlan>,
        cancellation: &CancellationToken,
    ) -> Result<(Vec<ToolpathPlan>, OptimizerStatistics)> {
        let mut stats = OptimizerStatistics::default();
        if plans.is_empty() {
            return Ok((plans, stats));
        }

        for plan in &mut plans {
            plan.repair_endpoints();
        }
        stats.original_travel_mm = total_travel(&plans);

        let groups = group_plans(plans, self.config.optimization.z_level_grouping);

        let mut output = Vec::new();
        let mut cursor = Point::new(0.0, 0.0);
        for (_, group_plans) in groups {
            if cancellation.is_cancelled() {
                stats.cancelled = true;
                stats.warnings.push("optimization cancelled mid-group".into());
                log::info!("optimizer: cancellation observed mid-group, {} plan(s) emitted so far", output.len());
                break;
            }

            let clusters = if self.config.optimization.path_ordering {
                cluster::build_clusters(group_plans, self.config)
            } else {
                group_plans
                    .into_iter()
                    .map(|p| Cluster::from_plans(vec![p]))
                    .collect()
            };
            stats.clusters_found += clusters.len();

            let (ordered_clusters, new_cursor) = order::order_clusters(clusters, cursor);
            cursor = new_cursor;

            for c in ordered_clusters {
                if cancellation.is_cancelled() {
                    stats.cancelled = true;
                    stats.warnings.push("optimization cancelled mid-cluster".into());
                    break;
                }
                let (ordered, new_cursor, staydown, rapid) =
                    order::order_cluster(c.plans, cursor, self.config);
                stats.staydown_links_used += staydown;
                stats.rapid_links_used += rapid;
                cursor = new_cursor;

                for mut plan in ordered {
                    if self.config.optimization.segment_simplification {
                        let before = plan.commands.len();
                        let start = plan
                            .commands
                            .first()
                            .and_then(|c| c.xy())
                            .unwrap_or(plan.entry_point);
                        let (head, tail) = split_loop(&plan);
                        let simplified_tail =
                            simplify::simplify_commands(tail, start, &self.config.simplification);
                        let mut commands = head;
                        let loop_start = commands.len();
                        commands.extend(simplified_tail);
                        plan.loop_range = plan
                            .loop_range
                            .map(|_| (loop_start, commands.len().max(loop_start)));
                        plan.commands = commands;
                        stats.points_removed += before.saturating_sub(plan.commands.len());
                    }
                    stats.paths_ordered += 1;
                    output.push(plan);
                }
            }
        }

        stats.optimized_travel_mm = total_travel(&output);
        if stats.cancelled {
            return Err(PcbCamError::Cancelled);
        }
        log::debug!(
            "optimizer: {} plan(s), {:.3}mm -> {:.3}mm travel, {} staydown link(s)",
            stats.paths_ordered,
            stats.original_travel_mm,
            stats.optimized_travel_mm,
            stats.staydown_links_used
        );
        Ok((output, stats))
    }
}

/// Splits a plan's commands at its `loop_range` start so simplification
/// only ever rewrites the cuttable body, never the rapid/entry preamble
/// or the trailing retract.
fn split_loop(plan: &ToolpathPlan) -> (Vec<crate::types::MotionCommand>, Vec<crate::types::MotionCommand>) {
    match plan.loop_range {
        Some((start, _)) => (plan.commands[..start].to_vec(), plan.commands[start..].to_vec()),
        None => (Vec::new(), plan.commands.clone()),
    }
}

fn total_travel(plans: &[ToolpathPlan]) -> f64 {
    let mut total = 0.0;
    for plan in plans {
        let mut prev = plan.entry_point;
        for cmd in &plan.commands {
            total += cmd.arc_length_from(prev);
            if let Some(p) = cmd.xy() {
                prev = p;
            }
        }
    }
    total
}

fn z_bucket(plan: &ToolpathPlan) -> i64 {
    (plan.cut_depth / 0.01).round() as i64
}

/// Stage (A)/(B): partition into `(groupKey[, "|"zBucket])` buckets while
/// preserving the order in which each key was first seen, so output
/// ordering stays deterministic across runs.
fn group_plans(plans: Vec<ToolpathPlan>, split_by_z: bool) -> Vec<(String, Vec<ToolpathPlan>)> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    let mut groups: Vec<(String, Vec<ToolpathPlan>)> = Vec::new();

    for plan in plans {
        let key = if split_by_z {
            format!("{}|{}", plan.group_key, z_bucket(&plan))
        } else {
            plan.group_key.clone()
        };
        let idx = *buckets.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            groups.push((key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(plan);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::geometry::BoundingBox;
    use crate::ids::OperationId;
    use crate::types::{MotionCommand, MotionKind, Tool, ToolType};

    fn drill_plan(x: f64, y: f64, group_key: &str) -> ToolpathPlan {
        ToolpathPlan {
            operation_id: OperationId::new(),
            commands: vec![
                MotionCommand::new(MotionKind::Rapid { x, y, z: 2.0 }, None),
                MotionCommand::new(MotionKind::Plunge { z: -1.0 }, Some(100.0)),
                MotionCommand::new(MotionKind::Retract { z: 2.0 }, None),
            ],
            tool: Tool {
                diameter: 0.8,
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
            tool_diameter: 0.8,
            step_over: 1.0,
            pass: 0,
            group_key: group_key.to_string(),
            optimization: None,
            loop_range: None,
        }
    }

    #[test]
    fn groups_by_tool_key_preserve_insertion_order() {
        let plans = vec![
            drill_plan(0.0, 0.0, "0.800000"),
            drill_plan(1.0, 0.0, "1.000000"),
            drill_plan(2.0, 0.0, "0.800000"),
        ];
        let groups = group_plans(plans, false);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "0.800000");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "1.000000");
    }

    #[test]
    fn optimizer_never_drops_a_plan() {
        let config = Config::default();
        let optimizer = Optimizer::new(&config);
        let plans = vec![
            drill_plan(0.0, 0.0, "0.800000"),
            drill_plan(50.0, 50.0, "0.800000"),
            drill_plan(1.0, 0.0, "1.000000"),
        ];
        let token = CancellationToken::new();
        let (ordered, stats) = optimizer.optimize(plans, &token).unwrap();
        assert_eq!(ordered.len(), 3);
        assert_eq!(stats.paths_ordered, 3);
        assert!(!stats.cancelled);
    }

    #[test]
    fn three_pads_cluster_and_link_by_staydown() {
        let config = Config::default();
        let optimizer = Optimizer::new(&config);
        let plans = vec![
            drill_plan(0.0, 0.0, "0.800000"),
            drill_plan(0.5, 0.0, "0.800000"),
            drill_plan(1.0, 0.0, "0.800000"),
        ];
        let token = CancellationToken::new();
        let (_, stats) = optimizer.optimize(plans, &token).unwrap();
        assert_eq!(stats.clusters_found, 1);
        assert_eq!(stats.staydown_links_used, 2);
    }

    #[test]
    fn cancellation_before_any_group_is_honored() {
        let config = Config::default();
        let optimizer = Optimizer::new(&config);
        let plans = vec![drill_plan(0.0, 0.0, "0.800000")];
        let token = CancellationToken::new();
        token.cancel();
        let err = optimizer.optimize(plans, &token).unwrap_err();
        assert!(matches!(err, PcbCamError::Cancelled));
    }
}
