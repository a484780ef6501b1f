// conflux/src/connector/mod.rs

//! Seams to the outside world: the read-only connector registry the compiler
//! consults, and the transport capabilities the runtime drives.

pub mod mock;
pub mod registry;

pub use mock::{MockEndpoint, MockTransport, MOCK_SCHEME};
pub use registry::{ConnectorRegistry, StaticConnectorRegistry, TransportRegistry};

use crate::core::message::Message;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a transport needs to open an endpoint for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
  pub step_id: String,
  pub component_scheme: String,
  pub properties: BTreeMap<String, String>,
}

impl EndpointConfig {
  pub fn property(&self, key: &str) -> Option<&str> {
    self.properties.get(key).map(String::as_str)
  }

  pub fn require(&self, key: &str) -> anyhow::Result<&str> {
    self
      .property(key)
      .ok_or_else(|| anyhow!("endpoint '{}' is missing property '{}'", self.step_id, key))
  }

  /// `scheme:step-id`, used in logs and errors.
  pub fn uri(&self) -> String {
    format!("{}:{}", self.component_scheme, self.step_id)
  }
}

/// Opens endpoints for one component scheme.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn start(&self, config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>>;
}

/// A started endpoint owned by one pipeline.
#[async_trait]
pub trait Endpoint: Send + Sync {
  /// Hands a message to the endpoint. The returned messages continue down the
  /// route: none (consumed), the same one, a transformed one, or several.
  async fn send(&self, message: Message) -> anyhow::Result<Vec<Message>>;

  async fn stop(&self) -> anyhow::Result<()> {
    Ok(())
  }
}
