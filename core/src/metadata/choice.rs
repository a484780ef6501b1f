// conflux/src/metadata/choice.rs

use super::{input_shapes_of, merged_output_of, DynamicActionMetadata, MetadataHandler};
use crate::core::merge::merge_all;
use crate::core::shape::{Shape, ANY_SHAPE, NO_SHAPE};
use crate::core::step::Step;
use tracing::{event, Level};

/// Resolves shapes for choice steps.
///
/// The input is whatever the previous steps produce. The output side is a
/// data-agnostic fan-out: without a downstream consumer, or with a single one,
/// it stays `ANY`. Consumers that all take `NONE` give `NONE`, and several
/// distinct consumer inputs are merged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChoiceMetadataHandler;

impl ChoiceMetadataHandler {
  pub fn new() -> Self {
    ChoiceMetadataHandler
  }

  fn fan_out_shape(next: &[Step]) -> Shape {
    let inputs = input_shapes_of(next);
    if inputs.is_empty() {
      return ANY_SHAPE;
    }
    if inputs.iter().all(|s| s.is_none()) {
      return NO_SHAPE;
    }
    let contributors: Vec<&Shape> = inputs.into_iter().filter(|s| !s.is_none()).collect();
    if contributors.len() == 1 {
      return ANY_SHAPE;
    }
    merge_all(contributors)
  }
}

impl MetadataHandler for ChoiceMetadataHandler {
  fn create_metadata(&self, step: &Step, previous: &[Step], next: &[Step]) -> DynamicActionMetadata {
    let input = merged_output_of(previous);
    let output = Self::fan_out_shape(next);
    event!(
      Level::TRACE,
      step_id = %step.id,
      previous = previous.len(),
      next = next.len(),
      input = %input,
      output = %output,
      "Choice metadata resolved."
    );
    DynamicActionMetadata::new(input, output)
  }

  fn default_output_shape(&self) -> Shape {
    ANY_SHAPE
  }
}
