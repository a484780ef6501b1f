// conflux/src/metadata/endpoint.rs

use super::{DynamicActionMetadata, MetadataHandler};
use crate::core::shape::NO_SHAPE;
use crate::core::step::Step;

/// Endpoint steps declare their own shapes; an undeclared side is `NONE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EndpointMetadataHandler;

impl MetadataHandler for EndpointMetadataHandler {
  fn create_metadata(&self, step: &Step, _previous: &[Step], _next: &[Step]) -> DynamicActionMetadata {
    DynamicActionMetadata::new(
      step.input_shape().cloned().unwrap_or(NO_SHAPE),
      step.output_shape().cloned().unwrap_or(NO_SHAPE),
    )
  }
}
