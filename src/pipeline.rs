//! Ambient orchestration tying stages 1–7 together for a whole job: one or
//! more Gerber layers' primitives, each with its own machining parameters,
//! compiled independently (stages 1–5, §5's "share no mutable state"
//! guarantee), then optimized together across every operation sharing a
//! tool (stage 6), then measured (stage 7). Grounded on the teacher's
//! `toolpath_generation::generate_toolpaths_for_operations` shape: iterate
//! operations, collect a per-operation report, never let one failing
//! operation block the rest.

use crate::boolean::engine::{BooleanEngine, FillRule};
use crate::boolean::polytree::{execute_poly_tree, ClipType};
use crate::boolean::tangency::TangencyResolver;
use crate::cancellation::CancellationToken;
use crate::compiler::ToolpathCompiler;
use crate::config::Config;
use crate::error::Result;
use crate::geometry::{Path, Polarity, Primitive};
use crate::ids::OperationId;
use crate::metadata::{MetadataCalculator, PlanMetadata};
use crate::offset_generator::{OffsetDirection, OffsetGenerator};
use crate::optimizer::Optimizer;
use crate::polygon_builder::PolygonBuilder;
use crate::types::{CutSide, OperationParams, OperationReport, OptimizerStatistics, ToolpathPlan};

/// One Gerber layer's decoded primitives plus the machining parameters to
/// cut it with. The pipeline's unit of independent work (§5).
pub struct OperationInput {
    pub operation_id: OperationId,
    pub primitives: Vec<Primitive>,
    pub params: OperationParams,
}

/// Everything produced by a full pipeline run: the optimized, ordered plan
/// stream (stage 6), per-plan recomputed metadata (stage 7), per-operation
/// reports (§7), and the optimizer's own statistics.
pub struct PipelineOutput {
    pub plans: Vec<ToolpathPlan>,
    pub metadata: Vec<PlanMetadata>,
    pub reports: Vec<OperationReport>,
    pub optimizer_stats: OptimizerStatistics,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    engine: BooleanEngine,
    builder: PolygonBuilder,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            engine: BooleanEngine::new(config),
            builder: PolygonBuilder::new(config),
        }
    }

    /// Stages 1–5 for one operation: polygon build, dark/clear boolean
    /// cleanup with tangency resolution, offset generation, toolpath
    /// compilation. Never raises past the caller: a failed operation comes
    /// back as an `OperationReport` with `status: Error` and an empty plan
    /// list, so operation `j` is unaffected by operation `i`'s failure
    /// (§7's partial-success contract).
    pub fn compile_operation(&self, input: &OperationInput) -> (Vec<ToolpathPlan>, OperationReport) {
        match self.try_compile_operation(input) {
            Ok((plans, warnings)) => {
                for warning in &warnings {
                    log::warn!("operation {}: {warning}", input.operation_id);
                }
                log::debug!("operation {}: compiled {} plan(s)", input.operation_id, plans.len());
                (plans, OperationReport::ok(input.operation_id).with_warnings(warnings))
            }
            Err(err) => {
                log::error!("operation {}: {err}", input.operation_id);
                (Vec::new(), OperationReport::failed(input.operation_id, err.to_string()))
            }
        }
    }

    fn try_compile_operation(&self, input: &OperationInput) -> Result<(Vec<ToolpathPlan>, Vec<String>)> {
        let mut warnings = Vec::new();

        let (contours, builder_warnings) = self.builder.build(&input.primitives)?;
        warnings.extend(builder_warnings);

        let mut dark: Vec<Path> = contours
            .iter()
            .filter(|c| c.polarity == Polarity::Dark)
            .map(|c| c.path.clone())
            .collect();
        let clear: Vec<Path> = contours
            .iter()
            .filter(|c| c.polarity == Polarity::Clear)
            .map(|c| c.path.clone())
            .collect();

        if dark.is_empty() {
            return Ok((Vec::new(), warnings));
        }

        let mut tangency = TangencyResolver::new(self.config.tangency);
        warnings.extend(tangency.resolve(&self.engine, &mut dark));
        let mut clear = clear;
        warnings.extend(tangency.resolve(&self.engine, &mut clear));

        let mut copper = self.engine.union_self(&dark, FillRule::NonZero)?;
        if !clear.is_empty() {
            copper = self.engine.difference(&copper, &clear, FillRule::NonZero)?;
        }
        if copper.is_empty() {
            return Ok((Vec::new(), warnings));
        }

        let group_key = input.params.tool.group_key();
        let compiler = ToolpathCompiler::new(self.config);
        let mut plans = Vec::new();

        match input.params.cut_side {
            CutSide::On => {
                if input.params.tool.diameter <= 0.0 {
                    return Err(crate::error::PcbCamError::InvalidParameter(
                        "tool diameter must be > 0".into(),
                    ));
                }
                // "on" cuts the boundary itself rather than an offset of
                // it, so the layer is built directly from `copper` at
                // delta 0 instead of going through the offset generator's
                // always-positive d/2-and-up pass formula.
                let centerline_layer = crate::offset_generator::OffsetLayer {
                    pass: 0,
                    paths: copper.clone(),
                    group_key: group_key.clone(),
                    step_over: 1.0,
                    tool_diameter: input.params.tool.diameter,
                    delta: 0.0,
                };
                let (mut layer_plans, compile_warnings) =
                    compiler.compile_layer(&centerline_layer, &input.params, input.operation_id)?;
                for plan in &mut layer_plans {
                    plan.is_centerline_path = true;
                }
                warnings.extend(compile_warnings);
                plans.extend(layer_plans);
            }
            CutSide::Outside => {
                let generator = OffsetGenerator::new(&self.engine);
                let (layers, pass_warnings) = generator.generate(
                    &copper,
                    input.params.tool.diameter,
                    input.params.passes,
                    input.params.step_over,
                    OffsetDirection::External,
                    &group_key,
                )?;
                warnings.extend(pass_warnings);
                for layer in &layers {
                    let (layer_plans, compile_warnings) =
                        compiler.compile_layer(layer, &input.params, input.operation_id)?;
                    warnings.extend(compile_warnings);
                    plans.extend(layer_plans);
                }
            }
            CutSide::Inside => {
                let generator = OffsetGenerator::new(&self.engine);
                let (layers, pass_warnings) = generator.generate(
                    &copper,
                    input.params.tool.diameter,
                    input.params.passes,
                    input.params.step_over,
                    OffsetDirection::Internal,
                    &group_key,
                )?;
                warnings.extend(pass_warnings);
                for layer in &layers {
                    let (mut layer_plans, compile_warnings) =
                        compiler.compile_layer(layer, &input.params, input.operation_id)?;
                    warnings.extend(compile_warnings);
                    for plan in &mut layer_plans {
                        plan.is_drill_milling = true;
                    }
                    plans.extend(layer_plans);
                }
            }
        }

        if input.params.mill_holes {
            let tree = execute_poly_tree(&self.engine, &copper, &[], ClipType::Union, FillRule::NonZero)?;
            let holes: Vec<Path> = tree
                .flatten()
                .into_iter()
                .filter(|(_, is_hole)| *is_hole)
                .map(|(path, _)| path)
                .collect();
            if !holes.is_empty() {
                let generator = OffsetGenerator::new(&self.engine);
                let (layers, pass_warnings) = generator.generate(
                    &holes,
                    input.params.tool.diameter,
                    input.params.passes,
                    input.params.step_over,
                    OffsetDirection::Internal,
                    &group_key,
                )?;
                warnings.extend(pass_warnings);
                for layer in &layers {
                    let (mut layer_plans, compile_warnings) =
                        compiler.compile_layer(layer, &input.params, input.operation_id)?;
                    warnings.extend(compile_warnings);
                    for plan in &mut layer_plans {
                        plan.is_drill_milling = true;
                    }
                    plans.extend(layer_plans);
                }
            }
        }

        Ok((plans, warnings))
    }

    /// Stage 6 across every compiled plan from every operation, then stage
    /// 7 metadata recomputation per resulting plan.
    pub fn optimize_and_finalize(
        &self,
        plans: Vec<ToolpathPlan>,
        cancellation: &CancellationToken,
    ) -> Result<(Vec<ToolpathPlan>, Vec<PlanMetadata>, OptimizerStatistics)> {
        let optimizer = Optimizer::new(self.config);
        let (ordered, stats) = optimizer.optimize(plans, cancellation)?;
        let calculator = MetadataCalculator::new(self.config);
        let metadata = ordered.iter().map(|p| calculator.calculate(p)).collect();
        Ok((ordered, metadata, stats))
    }

    /// Run the whole pipeline over every operation in one job: stages 1–5
    /// per operation (a failure in one does not block the others), stage 6
    /// over the combined plan set, stage 7 per plan.
    pub fn run(&self, operations: &[OperationInput], cancellation: &CancellationToken) -> Result<PipelineOutput> {
        let mut all_plans = Vec::new();
        let mut reports = Vec::new();
        for input in operations {
            let (plans, report) = self.compile_operation(input);
            all_plans.extend(plans);
            reports.push(report);
        }

        let (plans, metadata, optimizer_stats) = self.optimize_and_finalize(all_plans, cancellation)?;
        Ok(PipelineOutput {
            plans,
            metadata,
            reports,
            optimizer_stats,
        })
    }
}
