// conflux/src/metadata/passthrough.rs

use super::{merged_output_of, DynamicActionMetadata, MetadataHandler};
use crate::core::step::Step;

/// Filter and log steps hand the message on unchanged: output equals input, and
/// input is what the previous steps produce.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughMetadataHandler;

impl MetadataHandler for PassThroughMetadataHandler {
  fn create_metadata(&self, step: &Step, previous: &[Step], _next: &[Step]) -> DynamicActionMetadata {
    let input = step.input_shape().cloned().unwrap_or_else(|| merged_output_of(previous));
    let output = step.output_shape().cloned().unwrap_or_else(|| input.clone());
    DynamicActionMetadata::new(input, output)
  }
}
