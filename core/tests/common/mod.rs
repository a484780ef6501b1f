// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use conflux::{
  ConnectorAction, ConnectorDescriptor, Dependency, Endpoint, EndpointConfig, Message, MockTransport, Shape, Step,
  StepKind, Transport, TransportRegistry,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

pub const SQL_SCHEME: &str = "sql";
pub const SLOW_SCHEME: &str = "slow";
pub const FLAKY_SCHEME: &str = "flaky";
pub const BROKEN_SCHEME: &str = "broken";

// --- Test transports ---

/// Answers every message with a fixed set of rows, like a SQL select would.
pub struct SqlStubTransport {
  rows: Vec<Value>,
  pub stops: Arc<AtomicUsize>,
}

impl SqlStubTransport {
  pub fn new(rows: Vec<Value>) -> Self {
    SqlStubTransport {
      rows,
      stops: Arc::new(AtomicUsize::new(0)),
    }
  }
}

struct SqlStubEndpoint {
  rows: Vec<Value>,
  stops: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for SqlStubTransport {
  async fn start(&self, config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>> {
    config.require("query")?;
    Ok(Arc::new(SqlStubEndpoint {
      rows: self.rows.clone(),
      stops: self.stops.clone(),
    }))
  }
}

#[async_trait]
impl Endpoint for SqlStubEndpoint {
  async fn send(&self, message: Message) -> anyhow::Result<Vec<Message>> {
    Ok(self.rows.iter().map(|row| message.derive(row.clone())).collect())
  }

  async fn stop(&self) -> anyhow::Result<()> {
    self.stops.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

/// Fails to open any endpoint.
pub struct BrokenTransport;

#[async_trait]
impl Transport for BrokenTransport {
  async fn start(&self, config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>> {
    anyhow::bail!("cannot connect {}", config.uri())
  }
}

/// Fails messages whose body has `"fail": true`; its `stop` fails too when asked.
pub struct FlakyTransport {
  pub fail_on_stop: bool,
}

struct FlakyEndpoint {
  fail_on_stop: bool,
}

#[async_trait]
impl Transport for FlakyTransport {
  async fn start(&self, _config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>> {
    Ok(Arc::new(FlakyEndpoint {
      fail_on_stop: self.fail_on_stop,
    }))
  }
}

#[async_trait]
impl Endpoint for FlakyEndpoint {
  async fn send(&self, message: Message) -> anyhow::Result<Vec<Message>> {
    if message.body.get("fail") == Some(&Value::Bool(true)) {
      anyhow::bail!("downstream rejected {}", message.body);
    }
    Ok(vec![message])
  }

  async fn stop(&self) -> anyhow::Result<()> {
    if self.fail_on_stop {
      anyhow::bail!("connection already closed");
    }
    Ok(())
  }
}

/// Holds each message for a fixed delay before passing it on.
pub struct SlowTransport {
  pub delay: Duration,
}

struct SlowEndpoint {
  delay: Duration,
}

#[async_trait]
impl Transport for SlowTransport {
  async fn start(&self, _config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>> {
    Ok(Arc::new(SlowEndpoint { delay: self.delay }))
  }
}

#[async_trait]
impl Endpoint for SlowEndpoint {
  async fn send(&self, message: Message) -> anyhow::Result<Vec<Message>> {
    tokio::time::sleep(self.delay).await;
    Ok(vec![message])
  }
}

// --- Common step builders ---

pub fn sql_rows() -> Vec<Value> {
  vec![
    json!({"id": 1, "first_name": "Ada", "last_name": "Lovelace", "company": "Analytical Engines"}),
    json!({"id": 2, "first_name": "Grace", "last_name": "Hopper", "company": "Navy"}),
    json!({"id": 3, "first_name": "Linus", "last_name": "Torvalds", "company": "Linux Foundation"}),
  ]
}

pub fn contact_shape() -> Shape {
  Shape::json_instance(r#"{"id":1,"first_name":"","last_name":"","company":""}"#).with_description("contact row")
}

pub fn sql_descriptor() -> ConnectorDescriptor {
  ConnectorDescriptor::new(SQL_SCHEME)
    .with_output_shape(contact_shape())
    .with_required_property("query")
    .with_dependency(Dependency {
      group_id: "io.conflux.connectors".into(),
      artifact_id: "sql-connector".into(),
      version: Some("1.0.0".into()),
    })
}

pub fn sql_step(id: &str) -> Step {
  Step::endpoint(id, ConnectorAction::new("sql-select", sql_descriptor()))
    .with_property("query", "SELECT * FROM contact")
}

pub fn mock_step(id: &str, name: &str) -> Step {
  Step::endpoint(id, ConnectorAction::new("mock-sink", ConnectorDescriptor::new(conflux::connector::MOCK_SCHEME)))
    .with_property("name", name)
}

pub fn endpoint_step(id: &str, scheme: &str) -> Step {
  Step::endpoint(id, ConnectorAction::new(format!("{}-action", scheme), ConnectorDescriptor::new(scheme)))
}

pub fn mapper_step(id: &str, mappings: &str) -> Step {
  Step::new(id, StepKind::Mapper).with_property("mappings", mappings)
}

pub fn filter_step(id: &str, rules: &str) -> Step {
  Step::new(id, StepKind::Filter).with_property("rules", rules)
}

/// A pass-through step whose descriptor declares the given shapes.
pub fn shaped_step(id: &str, input: Option<Shape>, output: Option<Shape>) -> Step {
  let mut descriptor = ConnectorDescriptor::new("direct");
  descriptor.input_data_shape = input;
  descriptor.output_data_shape = output;
  Step::endpoint(id, ConnectorAction::new(format!("{}-action", id), descriptor))
}

pub fn transports_with(mock: Arc<MockTransport>) -> TransportRegistry {
  TransportRegistry::new()
    .with_transport(SQL_SCHEME, Arc::new(SqlStubTransport::new(sql_rows())))
    .with_transport(conflux::connector::MOCK_SCHEME, mock)
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
