pub mod control;
pub mod json;
pub mod merge;
pub mod message;
pub mod shape;
pub mod step;

// Re-export key types for easier access from other conflux modules (and lib.rs)
pub use control::PipelineState;
pub use json::{json_matches, json_mismatch, CompareMode};
pub use merge::{merge, merge_all};
pub use message::Message;
pub use shape::{Shape, ShapeKind, ANY_SHAPE, NO_SHAPE};
pub use step::{Branch, ConnectorAction, ConnectorDescriptor, Dependency, Flow, Integration, Step, StepKind};
