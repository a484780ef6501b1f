// conflux_core/examples/sql_to_mock.rs

use async_trait::async_trait;
use conflux::{
  Conflux, ConfluxError, ConnectorAction, ConnectorDescriptor, Endpoint, EndpointConfig, Flow, Integration, Message,
  MockTransport, RuntimeConfig, Shape, StaticConnectorRegistry, Step, StepKind, Transport, TransportRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

// 1. A stand-in for a database connector: every trigger yields the same rows.
struct FixedRowsTransport {
  rows: Vec<Value>,
}

struct FixedRowsEndpoint {
  rows: Vec<Value>,
}

#[async_trait]
impl Transport for FixedRowsTransport {
  async fn start(&self, config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>> {
    info!(query = config.require("query")?, "Opening fixed rows endpoint");
    Ok(Arc::new(FixedRowsEndpoint { rows: self.rows.clone() }))
  }
}

#[async_trait]
impl Endpoint for FixedRowsEndpoint {
  async fn send(&self, trigger: Message) -> anyhow::Result<Vec<Message>> {
    Ok(self.rows.iter().map(|row| trigger.derive(row.clone())).collect())
  }
}

#[tokio::main]
async fn main() -> Result<(), ConfluxError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- SQL to Mock Example ---");

  let config = RuntimeConfig::from_env()?;
  let mock = Arc::new(MockTransport::new(config.mock_wait_timeout));
  let transports = TransportRegistry::new()
    .with_transport(
      "sql",
      Arc::new(FixedRowsTransport {
        rows: vec![
          json!({"id": 1, "first_name": "Ada", "company": "Analytical Engines"}),
          json!({"id": 2, "first_name": "Grace", "company": "Navy"}),
        ],
      }),
    )
    .with_transport(conflux::connector::MOCK_SCHEME, mock.clone());

  // 2. One flow: select rows, keep two fields, capture them in `mock:result`.
  let sql = ConnectorDescriptor::new("sql")
    .with_output_shape(Shape::json_instance(r#"{"id":1,"first_name":"","company":""}"#))
    .with_required_property("query");
  let integration = Integration::new(
    "contacts",
    "Contacts to Mock",
    vec![Flow::new(
      "main",
      vec![
        Step::endpoint("sql", ConnectorAction::new("sql-select", sql)).with_property("query", "SELECT * FROM contact"),
        Step::new("map", StepKind::Mapper).with_property("mappings", r#"{"first_name": "/first_name", "company": "/company"}"#),
        Step::endpoint("sink", ConnectorAction::new("mock", ConnectorDescriptor::new("mock"))).with_property("name", "result"),
      ],
    )],
  );

  // 3. Deploy, trigger once, and check what arrived.
  let conflux = Conflux::new(Arc::new(StaticConnectorRegistry::new()), transports, config);
  let project = conflux.deploy(&integration).await?;
  info!(artifact_id = %project.artifact_id, "Deployed");

  let report = conflux.route("contacts", "main", Message::new(json!({"trigger": "manual"}))).await?;
  info!(delivered = report.delivered.len(), failures = report.failures.len(), "Routed");

  for message in mock.endpoint("result").assert_received(2).await? {
    info!(body = %message.body, "Captured");
  }

  conflux.undeploy("contacts").await?;
  info!("--- SQL to Mock Example Finished ---");
  Ok(())
}
