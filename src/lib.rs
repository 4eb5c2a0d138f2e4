//! A PCB CAM toolpath pipeline: Gerber RS-274X parsing, polygon building,
//! exact polygon boolean combination, offset generation, toolpath
//! compilation (entry strategies, tabs, drill cycles), six-stage toolpath
//! optimization, and metadata recomputation.
//!
//! Modules are kept flat and re-exported at the crate root so callers can
//! `use pcbroute::{Config, Pipeline, OperationInput};` without chasing
//! module paths, the same shape this crate's boolean/optimizer submodules
//! use internally.

pub mod boolean;
pub mod cancellation;
pub mod compiler;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gerber;
pub mod ids;
pub mod metadata;
pub mod offset_generator;
pub mod optimizer;
pub mod pipeline;
pub mod polygon_builder;
pub mod types;

pub use boolean::{BooleanEngine, EndType, FillRule, JoinType};
pub use cancellation::CancellationToken;
pub use compiler::ToolpathCompiler;
pub use config::Config;
pub use error::{PcbCamError, Result};
pub use geometry::{
    Aperture, ApertureMacro, ApertureShape, ArcDirection, BoundingBox, FixedPoint, FlashShape,
    MacroPrimitive, Point, Polarity, Primitive, TraceInterpolation,
};
pub use gerber::{parse, parse_or_fail, GerberDocument};
pub use ids::{LayerId, OperationId};
pub use metadata::{MetadataCalculator, OperationMetadata, PlanMetadata};
pub use offset_generator::{OffsetDirection, OffsetGenerator, OffsetLayer};
pub use optimizer::Optimizer;
pub use pipeline::{OperationInput, Pipeline, PipelineOutput};
pub use polygon_builder::{BuiltContour, PolygonBuilder};
pub use types::{
    CannedCycle, Cluster, CutSide, EntryType, LinkType, MillingDirection, MotionCommand,
    MotionKind, OperationParams, OperationReport, OperationStatus, OptimizationRecord,
    OptimizerStatistics, Tool, ToolType, ToolpathPlan,
};
