// conflux/src/connector/registry.rs

use super::Transport;
use crate::core::step::ConnectorAction;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{event, Level};

/// Read-only lookup of connector actions by id.
pub trait ConnectorRegistry: Send + Sync {
  fn action(&self, action_id: &str) -> Option<ConnectorAction>;
}

/// A fixed set of actions known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticConnectorRegistry {
  actions: HashMap<String, ConnectorAction>,
}

impl StaticConnectorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_action(mut self, action: ConnectorAction) -> Self {
    self.register(action);
    self
  }

  pub fn register(&mut self, action: ConnectorAction) {
    event!(Level::DEBUG, action_id = %action.id, "Registering connector action.");
    self.actions.insert(action.id.clone(), action);
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }
}

impl ConnectorRegistry for StaticConnectorRegistry {
  fn action(&self, action_id: &str) -> Option<ConnectorAction> {
    self.actions.get(action_id).cloned()
  }
}

/// Transports keyed by component scheme, injected into pipelines.
#[derive(Clone, Default)]
pub struct TransportRegistry {
  transports: HashMap<String, Arc<dyn Transport>>,
}

impl TransportRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_transport(mut self, scheme: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
    self.register(scheme, transport);
    self
  }

  pub fn register(&mut self, scheme: impl Into<String>, transport: Arc<dyn Transport>) {
    let scheme = scheme.into();
    event!(Level::DEBUG, %scheme, "Registering transport.");
    self.transports.insert(scheme, transport);
  }

  pub fn get(&self, scheme: &str) -> Option<Arc<dyn Transport>> {
    self.transports.get(scheme).cloned()
  }
}

impl fmt::Debug for TransportRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut schemes: Vec<&String> = self.transports.keys().collect();
    schemes.sort();
    f.debug_struct("TransportRegistry").field("schemes", &schemes).finish()
  }
}
