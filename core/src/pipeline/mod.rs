// conflux/src/pipeline/mod.rs

//! Compiled pipeline definitions and the runtime that executes them.

pub mod definition;
pub mod execution;
pub mod lifecycle;

pub use definition::{ActionDef, ActionKind, CompiledBranch, PipelineDefinition, ShapeConflictWarning, ShapeSide};
pub use execution::RouteReport;
pub use lifecycle::Pipeline;
