// tests/registry_tests.rs
mod common;

use common::*;
use conflux::{
  Conflux, ConfluxError, Flow, Integration, Message, MockTransport, PipelineState, RuntimeConfig,
  StaticConnectorRegistry, Step, StepKind, TransportRegistry,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn conflux_with(transports: TransportRegistry) -> Conflux {
  let config = RuntimeConfig::default().with_stop_grace_period(Duration::from_millis(200));
  Conflux::new(Arc::new(StaticConnectorRegistry::new()), transports, config)
}

fn contacts_integration() -> Integration {
  Integration::new(
    "contacts",
    "Contacts Sync",
    vec![
      Flow::new(
        "to-mock",
        vec![
          sql_step("sql"),
          mapper_step("map", r#"{"first_name": "/first_name"}"#),
          mock_step("sink", "registry-result"),
        ],
      ),
      Flow::new("audit", vec![mock_step("audit-sink", "registry-audit")]),
    ],
  )
  .with_description("Copies contacts")
}

#[tokio::test]
async fn test_registry_deploys_and_routes_by_flow() {
  setup_tracing();
  let mock = Arc::new(MockTransport::new(Duration::from_secs(2)));
  let conflux = conflux_with(transports_with(mock.clone()));

  let project = conflux.deploy(&contacts_integration()).await.expect("deploys");
  assert_eq!(project.artifact_id, "contacts-sync");
  assert_eq!(project.description.as_deref(), Some("Copies contacts"));
  assert_eq!(project.dependencies.len(), 1);
  assert_eq!(conflux.deployed_ids(), vec!["contacts".to_string()]);

  let report = conflux
    .route("contacts", "to-mock", Message::new(json!({})))
    .await
    .unwrap();
  assert_eq!(report.delivered.len(), 3);
  mock.endpoint("registry-result").assert_received(3).await.unwrap();
  assert_eq!(mock.endpoint("registry-audit").received_count(), 0);

  let audit = conflux.pipeline("contacts", "audit").unwrap();
  assert_eq!(audit.state(), PipelineState::Started);

  conflux.undeploy("contacts").await.unwrap();
  assert!(conflux.deployed_ids().is_empty());
  assert_eq!(audit.state(), PipelineState::Stopped);
}

#[tokio::test]
async fn test_registry_flow_not_found() {
  setup_tracing();
  let conflux = conflux_with(TransportRegistry::new());
  let err = conflux
    .route("nothing", "here", Message::new(json!(null)))
    .await
    .unwrap_err();
  assert!(err.is_not_found());
  assert!(matches!(
    err,
    ConfluxError::FlowNotFound { ref flow_id, .. } if flow_id.as_deref() == Some("here")
  ));
  let err = conflux.undeploy("nothing").await.unwrap_err();
  assert!(matches!(err, ConfluxError::FlowNotFound { flow_id: None, .. }));
  assert!(err.to_string().contains("'nothing' is not deployed"));
}

#[tokio::test]
async fn test_registry_rejects_double_deploy() {
  setup_tracing();
  let mock = Arc::new(MockTransport::new(Duration::from_secs(1)));
  let conflux = conflux_with(transports_with(mock));
  let integration = contacts_integration();
  conflux.deploy(&integration).await.unwrap();
  assert!(matches!(
    conflux.deploy(&integration).await,
    Err(ConfluxError::InvalidState { .. })
  ));
  conflux.undeploy("contacts").await.unwrap();
}

#[tokio::test]
async fn test_registry_compile_error_starts_nothing() {
  setup_tracing();
  let sql = Arc::new(SqlStubTransport::new(sql_rows()));
  let stops = sql.stops.clone();
  let conflux = conflux_with(TransportRegistry::new().with_transport(SQL_SCHEME, sql));
  let broken = Integration::new(
    "broken",
    "Broken",
    vec![
      Flow::new("ok", vec![sql_step("sql")]),
      Flow::new("bad", vec![Step::new("x", StepKind::from("warp"))]),
    ],
  );
  assert!(conflux.deploy(&broken).await.unwrap_err().is_configuration());
  assert!(conflux.deployed_ids().is_empty());
  assert_eq!(stops.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_registry_start_error_stops_started_flows() {
  setup_tracing();
  let sql = Arc::new(SqlStubTransport::new(sql_rows()));
  let stops = sql.stops.clone();
  let transports = TransportRegistry::new()
    .with_transport(SQL_SCHEME, sql)
    .with_transport(BROKEN_SCHEME, Arc::new(BrokenTransport));
  let conflux = conflux_with(transports);
  let integration = Integration::new(
    "partial",
    "Partial",
    vec![
      Flow::new("first", vec![sql_step("sql")]),
      Flow::new("second", vec![endpoint_step("out", BROKEN_SCHEME)]),
    ],
  );
  let err = conflux.deploy(&integration).await.unwrap_err();
  assert!(matches!(err, ConfluxError::Transport { .. }));
  assert!(conflux.deployed_ids().is_empty());
  assert_eq!(stops.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_registry_dead_letters_through_shared_sink() {
  setup_tracing();
  let mock = Arc::new(MockTransport::new(Duration::from_secs(1)));
  let sink = mock.endpoint("registry-dead");
  let transports = TransportRegistry::new().with_transport(FLAKY_SCHEME, Arc::new(FlakyTransport { fail_on_stop: false }));
  let conflux = conflux_with(transports).with_error_sink(sink.clone());
  let integration = Integration::new("dl", "Dead Letters", vec![Flow::new("flow", vec![endpoint_step("flaky", FLAKY_SCHEME)])]);
  conflux.deploy(&integration).await.unwrap();

  let report = conflux.route("dl", "flow", Message::new(json!({"fail": true}))).await.unwrap();
  assert_eq!(report.dead_lettered, 1);
  sink.assert_received(1).await.unwrap();
  assert!(conflux.project("dl").is_some());
  conflux.undeploy("dl").await.unwrap();
}
