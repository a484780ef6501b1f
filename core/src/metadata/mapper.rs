// conflux/src/metadata/mapper.rs

use super::{merged_output_of, DynamicActionMetadata, MetadataHandler};
use crate::conditional::mapping::{Mapping, MAPPINGS_PROPERTY};
use crate::core::shape::{Shape, ANY_SHAPE};
use crate::core::step::Step;
use tracing::{event, Level};

pub const MAPPER_OUTPUT_DESCRIPTION: &str = "mapped fields";

/// Mapper input is the previous output; its output is a JSON document made of
/// the configured target fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapperMetadataHandler;

impl MapperMetadataHandler {
  fn mapped_shape(step: &Step) -> Shape {
    let Some(raw) = step.configured_properties.get(MAPPINGS_PROPERTY) else {
      return ANY_SHAPE;
    };
    match Mapping::parse(raw) {
      Ok(mapping) if !mapping.fields.is_empty() => {
        Shape::json_instance(mapping.output_specification()).with_description(MAPPER_OUTPUT_DESCRIPTION)
      }
      Ok(_) => ANY_SHAPE,
      Err(reason) => {
        // Best effort at design time; the compiler reports the bad property.
        event!(Level::WARN, step_id = %step.id, %reason, "Mapper output shape falls back to ANY.");
        ANY_SHAPE
      }
    }
  }
}

impl MetadataHandler for MapperMetadataHandler {
  fn create_metadata(&self, step: &Step, previous: &[Step], _next: &[Step]) -> DynamicActionMetadata {
    let input = step.input_shape().cloned().unwrap_or_else(|| merged_output_of(previous));
    let output = step.output_shape().cloned().unwrap_or_else(|| Self::mapped_shape(step));
    DynamicActionMetadata::new(input, output)
  }

  fn default_output_shape(&self) -> Shape {
    ANY_SHAPE
  }
}
