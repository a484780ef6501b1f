// conflux/src/metadata/mod.rs

//! Per-step-kind strategies that derive a step's effective input and output
//! shapes from the steps around it.

pub mod choice;
pub mod endpoint;
pub mod mapper;
pub mod passthrough;
pub mod registry;

pub use choice::ChoiceMetadataHandler;
pub use endpoint::EndpointMetadataHandler;
pub use mapper::MapperMetadataHandler;
pub use passthrough::PassThroughMetadataHandler;
pub use registry::HandlerRegistry;

use crate::core::merge::merge_all;
use crate::core::shape::{Shape, NONE_SHAPE, NO_SHAPE};
use crate::core::step::Step;
use serde::{Deserialize, Serialize};

/// Resolved shapes of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicActionMetadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_shape: Option<Shape>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_shape: Option<Shape>,
}

impl DynamicActionMetadata {
  pub fn new(input_shape: Shape, output_shape: Shape) -> Self {
    DynamicActionMetadata {
      input_shape: Some(input_shape),
      output_shape: Some(output_shape),
    }
  }

  /// Metadata a step declares through its descriptor, if any side is declared.
  pub fn declared_by(step: &Step) -> Option<Self> {
    let input_shape = step.input_shape().cloned();
    let output_shape = step.output_shape().cloned();
    if input_shape.is_none() && output_shape.is_none() {
      return None;
    }
    Some(DynamicActionMetadata {
      input_shape,
      output_shape,
    })
  }

  pub fn is_complete(&self) -> bool {
    self.input_shape.is_some() && self.output_shape.is_some()
  }

  pub fn input(&self) -> &Shape {
    self.input_shape.as_ref().unwrap_or(&NONE_SHAPE)
  }

  pub fn output(&self) -> &Shape {
    self.output_shape.as_ref().unwrap_or(&NONE_SHAPE)
  }
}

/// Uniform capability every step kind's handler provides.
pub trait MetadataHandler: Send + Sync {
  /// Derives metadata for `step` from the steps feeding it (`previous`) and the
  /// steps it feeds (`next`), both in flow order.
  fn create_metadata(&self, step: &Step, previous: &[Step], next: &[Step]) -> DynamicActionMetadata;

  /// Completes caller-supplied metadata. Never re-derives a side that is already set.
  fn handle(&self, metadata: DynamicActionMetadata) -> DynamicActionMetadata {
    if metadata.is_complete() {
      return metadata;
    }
    DynamicActionMetadata {
      input_shape: metadata.input_shape.or_else(|| Some(self.default_input_shape())),
      output_shape: metadata.output_shape.or_else(|| Some(self.default_output_shape())),
    }
  }

  fn default_input_shape(&self) -> Shape {
    NO_SHAPE
  }

  fn default_output_shape(&self) -> Shape {
    NO_SHAPE
  }
}

/// Merge of the declared output shapes of `previous`.
pub fn merged_output_of(previous: &[Step]) -> Shape {
  merge_all(previous.iter().filter_map(Step::output_shape))
}

/// Declared input shapes of `next`, in order, skipping steps that declare none.
pub fn input_shapes_of(next: &[Step]) -> Vec<&Shape> {
  next.iter().filter_map(Step::input_shape).collect()
}
