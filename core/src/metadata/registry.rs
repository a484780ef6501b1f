// conflux/src/metadata/registry.rs

//! Maps step kinds to their metadata handlers.

use super::{
  ChoiceMetadataHandler, EndpointMetadataHandler, MapperMetadataHandler, MetadataHandler, PassThroughMetadataHandler,
};
use crate::core::step::{Step, StepKind};
use crate::error::{ConfluxError, ConfluxResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{event, Level};

#[derive(Clone)]
pub struct HandlerRegistry {
  handlers: HashMap<StepKind, Arc<dyn MetadataHandler>>,
}

impl HandlerRegistry {
  /// An empty registry; every lookup fails until handlers are registered.
  pub fn empty() -> Self {
    HandlerRegistry {
      handlers: HashMap::new(),
    }
  }

  /// Registry with the built-in handler for every known step kind.
  pub fn with_defaults() -> Self {
    let mut registry = Self::empty();
    registry.register(StepKind::Endpoint, Arc::new(EndpointMetadataHandler));
    registry.register(StepKind::Choice, Arc::new(ChoiceMetadataHandler));
    registry.register(StepKind::Filter, Arc::new(PassThroughMetadataHandler));
    registry.register(StepKind::Log, Arc::new(PassThroughMetadataHandler));
    registry.register(StepKind::Mapper, Arc::new(MapperMetadataHandler));
    registry
  }

  /// Registers (or replaces) the handler for `kind`.
  pub fn register(&mut self, kind: StepKind, handler: Arc<dyn MetadataHandler>) {
    event!(Level::DEBUG, step_kind = %kind, "Registering metadata handler.");
    self.handlers.insert(kind, handler);
  }

  pub fn handler_for(&self, step: &Step) -> ConfluxResult<Arc<dyn MetadataHandler>> {
    self.handlers.get(&step.kind).cloned().ok_or_else(|| {
      ConfluxError::configuration(
        step.id.clone(),
        format!("no metadata handler registered for step kind '{}'", step.kind),
      )
    })
  }

  pub fn is_registered(&self, kind: &StepKind) -> bool {
    self.handlers.contains_key(kind)
  }
}

impl Default for HandlerRegistry {
  fn default() -> Self {
    Self::with_defaults()
  }
}

impl fmt::Debug for HandlerRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut kinds: Vec<&StepKind> = self.handlers.keys().collect();
    kinds.sort();
    f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
  }
}
