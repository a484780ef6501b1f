// src/lib.rs

//! Conflux: compiles integration flows into executable pipelines and runs them.
//!
//! Conflux takes flows authored as ordered steps (connector endpoints, choices,
//! filters, mappers, logs) and:
//!  - Infers the data shape each step consumes and produces from the steps
//!    around it, merging incompatible shapes into named variants.
//!  - Validates and resolves every step's configuration against connector
//!    descriptors, collecting the libraries the flow depends on.
//!  - Runs the compiled pipeline on injected transports with a clear
//!    start / route / stop lifecycle, graceful shutdown and dead-lettering.
//!  - Deploys whole integrations through the `Conflux` registry.

pub mod compiler;
pub mod conditional;
pub mod config;
pub mod connector;
pub mod core;
pub mod error;
pub mod metadata;
pub mod packaging;
pub mod pipeline;
pub mod registry;

// --- Re-exports for the Public API ---

// The authored model and shape algebra
pub use crate::core::json::{json_matches, json_mismatch, json_str_matches, CompareMode};
pub use crate::core::merge::{merge, merge_all};
pub use crate::core::message::Message;
pub use crate::core::shape::{Shape, ShapeKind, ANY_SHAPE, NO_SHAPE};
pub use crate::core::step::{
  Branch, ConnectorAction, ConnectorDescriptor, Dependency, Flow, Integration, Step, StepKind,
};
pub use crate::core::control::PipelineState;

// Shape inference
pub use crate::metadata::{DynamicActionMetadata, HandlerRegistry, MetadataHandler};

// Compilation and runtime
pub use crate::compiler::FlowCompiler;
pub use crate::config::RuntimeConfig;
pub use crate::pipeline::{Pipeline, PipelineDefinition, RouteReport, ShapeConflictWarning};
pub use crate::conditional::{Mapping, Predicate, Rule};

// Seams to the outside world
pub use crate::connector::{
  ConnectorRegistry, Endpoint, EndpointConfig, MockEndpoint, MockTransport, StaticConnectorRegistry, Transport,
  TransportRegistry,
};

pub use crate::error::{ConfluxError, ConfluxResult};
pub use crate::packaging::ProjectContext;

// The deployment registry
pub use crate::registry::Conflux;
