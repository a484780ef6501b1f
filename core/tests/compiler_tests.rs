// tests/compiler_tests.rs
mod common;

use common::*;
use conflux::pipeline::{ActionKind, ShapeSide};
use conflux::{
  Branch, ConfluxError, ConnectorAction, ConnectorDescriptor, Dependency, Flow, FlowCompiler, HandlerRegistry,
  Integration, Predicate, Rule, Shape, ShapeKind, StaticConnectorRegistry, Step, StepKind, ANY_SHAPE, NO_SHAPE,
};
use conflux::conditional::Op;
use std::sync::Arc;

fn compiler() -> FlowCompiler {
  FlowCompiler::default()
}

fn contact_flow() -> Flow {
  Flow::new(
    "contacts",
    vec![
      sql_step("sql"),
      mapper_step("map", r#"{"first_name": "/first_name", "company": "/company"}"#),
      mock_step("sink", "result"),
    ],
  )
  .with_name("contacts to mock")
}

#[test]
fn test_compile_resolves_actions_and_shapes() {
  setup_tracing();
  let definition = compiler().compile(&contact_flow()).expect("flow compiles");

  assert_eq!(definition.flow_id(), "contacts");
  assert_eq!(definition.flow_name(), Some("contacts to mock"));
  let kinds: Vec<&str> = definition.actions().iter().map(|a| a.kind.name()).collect();
  assert_eq!(kinds, vec!["endpoint", "mapper", "endpoint"]);

  let mapper = definition.metadata("map").expect("mapper metadata");
  assert_eq!(mapper.input(), &contact_shape());
  assert_eq!(mapper.output().kind, ShapeKind::JsonInstance);

  let sql = definition.metadata("sql").expect("sql metadata");
  assert_eq!(sql.input(), &NO_SHAPE);
  assert_eq!(sql.output(), &contact_shape());
  assert!(definition.warnings().is_empty());
}

#[test]
fn test_unknown_step_kind_is_a_configuration_error() {
  setup_tracing();
  let flow = Flow::new("odd", vec![sql_step("sql"), Step::new("warp", StepKind::from("teleport"))]);
  match compiler().compile(&flow) {
    Err(ConfluxError::Configuration { step_id, message }) => {
      assert_eq!(step_id, "warp");
      assert!(message.contains("teleport"));
    }
    other => panic!("expected configuration error, got {:?}", other.map(|d| d.flow_id().to_string())),
  }
}

#[test]
fn test_custom_handler_for_unknown_kind_still_has_no_runtime_action() {
  setup_tracing();
  let mut handlers = HandlerRegistry::with_defaults();
  handlers.register(StepKind::from("teleport"), Arc::new(conflux::metadata::PassThroughMetadataHandler));
  let compiler = compiler().with_handlers(handlers);
  let flow = Flow::new("odd", vec![Step::new("warp", StepKind::from("teleport"))]);
  let err = compiler.compile(&flow).unwrap_err();
  assert!(err.is_configuration());
  assert!(err.to_string().contains("no runtime action"));
}

#[test]
fn test_endpoint_without_descriptor_is_looked_up_in_the_registry() {
  setup_tracing();
  let registry = StaticConnectorRegistry::new().with_action(ConnectorAction::new("sql-select", sql_descriptor()));
  let compiler = FlowCompiler::new(Arc::new(registry));
  let flow = Flow::new(
    "lookup",
    vec![
      Step::endpoint("sql", ConnectorAction::reference("sql-select")).with_property("query", "SELECT 1"),
      mock_step("sink", "result"),
    ],
  );
  let definition = compiler.compile(&flow).expect("registry resolves the action");
  assert_eq!(definition.metadata("sql").unwrap().output(), &contact_shape());
  assert_eq!(definition.dependencies().len(), 1);
}

#[test]
fn test_missing_descriptor_is_a_configuration_error() {
  setup_tracing();
  let flow = Flow::new("lookup", vec![Step::endpoint("sql", ConnectorAction::reference("nowhere"))]);
  let err = compiler().compile(&flow).unwrap_err();
  assert!(err.is_configuration());
  assert!(err.to_string().contains("nowhere"));

  let bare = Flow::new("bare", vec![Step::new("e", StepKind::Endpoint)]);
  assert!(compiler().compile(&bare).unwrap_err().is_configuration());
}

#[test]
fn test_missing_required_property_is_a_configuration_error() {
  setup_tracing();
  let sql = Step::endpoint("sql", ConnectorAction::new("sql-select", sql_descriptor()));
  let err = compiler().compile(&Flow::new("f", vec![sql])).unwrap_err();
  assert!(err.to_string().contains("required property 'query'"));
}

#[test]
fn test_step_properties_override_connector_defaults() {
  setup_tracing();
  let descriptor = ConnectorDescriptor::new("http")
    .with_property("method", "GET")
    .with_property("timeout", "30");
  let step = Step::endpoint("call", ConnectorAction::new("http-call", descriptor)).with_property("method", "POST");
  let definition = compiler().compile(&Flow::new("f", vec![step])).unwrap();
  let action = definition.action("call").unwrap();
  assert_eq!(action.configuration.get("method").map(String::as_str), Some("POST"));
  assert_eq!(action.configuration.get("timeout").map(String::as_str), Some("30"));
}

#[test]
fn test_malformed_kind_properties_are_rejected() {
  setup_tracing();
  let bad_mapper = Flow::new("f", vec![sql_step("sql"), mapper_step("map", "{not json")]);
  assert!(compiler().compile(&bad_mapper).unwrap_err().is_configuration());

  let bad_rules = Flow::new("f", vec![sql_step("sql"), filter_step("only", r#"[{"path":"id","op":"~"}]"#)]);
  assert!(compiler().compile(&bad_rules).unwrap_err().is_configuration());

  let bad_mode = Flow::new(
    "f",
    vec![filter_step("only", "[]").with_property("predicate", "some")],
  );
  assert!(compiler().compile(&bad_mode).unwrap_err().is_configuration());
}

#[test]
fn test_duplicate_step_ids_and_empty_flows_are_rejected() {
  setup_tracing();
  let duplicate = Flow::new("f", vec![sql_step("same"), mock_step("same", "result")]);
  assert!(compiler().compile(&duplicate).unwrap_err().to_string().contains("duplicate"));
  assert!(compiler().compile(&Flow::new("empty", vec![])).is_err());
}

#[test]
fn test_compilation_is_deterministic() {
  setup_tracing();
  let flow = contact_flow();
  let first = compiler().compile(&flow).unwrap();
  let second = compiler().compile(&flow).unwrap();
  assert_eq!(first, second);
}

fn routing_choice(branches: Vec<Branch>) -> Step {
  Step::choice("route", branches)
}

fn big_companies() -> Predicate {
  Predicate::every(vec![Rule::new("id", Op::GreaterThan, "1")])
}

#[test]
fn test_choice_branches_see_inbound_steps_and_fan_in_after() {
  setup_tracing();
  let branch_a = shaped_step("a", None, Some(Shape::json_instance(r#"{"a":1}"#)));
  let branch_b = shaped_step("b", None, Some(Shape::json_instance(r#"{"b":1}"#)));
  let flow = Flow::new(
    "f",
    vec![
      sql_step("sql"),
      routing_choice(vec![Branch::when(big_companies(), vec![branch_a]), Branch::otherwise(vec![branch_b])]),
      Step::new("after", StepKind::Log),
    ],
  );
  let definition = compiler().compile(&flow).unwrap();

  // The choice's input is the SQL output; its next steps are a, b and the log.
  let choice = definition.metadata("route").unwrap();
  assert_eq!(choice.input(), &contact_shape());

  // Both branches end in different shapes, merged at the step after the choice.
  let after = definition.metadata("after").unwrap();
  assert!(after.input().is_union());
  assert_eq!(after.input().variants.len(), 2);
  assert!(definition
    .warnings()
    .iter()
    .any(|w| w.step_id == "after" && w.side == ShapeSide::Input));

  match &definition.action("route").unwrap().kind {
    ActionKind::Choice { branches } => {
      assert_eq!(branches.len(), 2);
      assert!(branches[1].condition.is_none());
    }
    other => panic!("expected a choice, got {}", other.name()),
  }
}

#[test]
fn test_choice_without_default_lets_inbound_shape_through() {
  setup_tracing();
  let branch_a = shaped_step("a", None, Some(Shape::json_instance(r#"{"a":1}"#)));
  let flow = Flow::new(
    "f",
    vec![
      sql_step("sql"),
      routing_choice(vec![Branch::when(big_companies(), vec![branch_a])]),
      Step::new("after", StepKind::Log),
    ],
  );
  let definition = compiler().compile(&flow).unwrap();
  let after = definition.metadata("after").unwrap().input();
  let specs: Vec<&str> = after.variants.iter().map(|v| v.specification.as_str()).collect();
  assert_eq!(specs, vec![r#"{"a":1}"#, contact_shape().specification.as_str()]);
}

#[test]
fn test_choice_layout_is_validated() {
  setup_tracing();
  let no_branches = Flow::new("f", vec![routing_choice(vec![])]);
  assert!(compiler().compile(&no_branches).unwrap_err().is_configuration());

  let default_first = Flow::new(
    "f",
    vec![routing_choice(vec![
      Branch::otherwise(vec![]),
      Branch::when(big_companies(), vec![]),
    ])],
  );
  assert!(compiler().compile(&default_first).unwrap_err().is_configuration());
}

#[test]
fn test_declared_shapes_go_through_handle() {
  setup_tracing();
  let declared = shaped_step("declared", Some(ANY_SHAPE), Some(Shape::json_instance("[]")));
  let flow = Flow::new("f", vec![sql_step("sql"), declared]);
  let definition = compiler().compile(&flow).unwrap();
  let metadata = definition.metadata("declared").unwrap();
  assert_eq!(metadata.input(), &ANY_SHAPE);
  assert_eq!(metadata.output(), &Shape::json_instance("[]"));
}

#[test]
fn test_dependencies_are_collected_once_in_order() {
  setup_tracing();
  let extra = Dependency::maven("io.conflux.connectors:http-connector:2.1").unwrap();
  let http = Step::endpoint(
    "http",
    ConnectorAction::new("http-call", ConnectorDescriptor::new("http").with_dependency(extra.clone())),
  );
  let flow = Flow::new("f", vec![sql_step("sql-1"), http, sql_step("sql-2")]);
  let definition = compiler().compile(&flow).unwrap();
  let coordinates: Vec<String> = definition.dependencies().iter().map(|d| d.to_string()).collect();
  assert_eq!(
    coordinates,
    vec![
      "io.conflux.connectors:sql-connector:1.0.0".to_string(),
      extra.to_string(),
    ]
  );
}

#[test]
fn test_compile_integration_compiles_every_flow_or_fails() {
  setup_tracing();
  let good = Integration::new("int-1", "Contacts", vec![contact_flow(), Flow::new("second", vec![sql_step("s")])]);
  let definitions = compiler().compile_integration(&good).unwrap();
  assert_eq!(definitions.len(), 2);

  let bad = Integration::new(
    "int-2",
    "Broken",
    vec![contact_flow(), Flow::new("bad", vec![Step::new("x", StepKind::from("nope"))])],
  );
  assert!(compiler().compile_integration(&bad).is_err());
}

#[test]
fn test_integration_export_is_loaded_with_generated_ids() {
  setup_tracing();
  let export = r#"{
    "id": "int-9",
    "name": "Export",
    "flows": [{
      "steps": [
        {"stepKind": "endpoint", "action": {"id": "sql-select", "descriptor": {
          "componentScheme": "sql",
          "outputDataShape": {"kind": "json-instance", "specification": "{\"id\":1}"},
          "configuredProperties": {"query": "SELECT 1"}
        }}},
        {"stepKind": "log", "configuredProperties": {"message": "row ${body}"}}
      ]
    }]
  }"#;
  let integration = Integration::from_json(export).unwrap();
  assert_eq!(integration.flows[0].id, "int-9-flow-1");
  assert_eq!(integration.flows[0].steps[1].id, "step-2");

  let definition = compiler().compile(&integration.flows[0]).unwrap();
  match &definition.action("step-2").unwrap().kind {
    ActionKind::Log { template } => assert_eq!(template, "row ${body}"),
    other => panic!("expected a log action, got {}", other.name()),
  }
  assert_eq!(definition.metadata("step-2").unwrap().input().specification, r#"{"id":1}"#);
}

#[test]
fn test_design_time_preview_uses_registry_descriptors() {
  setup_tracing();
  let registry = StaticConnectorRegistry::new().with_action(ConnectorAction::new("sql-select", sql_descriptor()));
  let compiler = FlowCompiler::new(Arc::new(registry));
  let previous = Step::endpoint("sql", ConnectorAction::reference("sql-select"));
  let preview = compiler
    .create_metadata(&Step::new("c", StepKind::Choice), &[previous], &[])
    .unwrap();
  assert_eq!(preview.input(), &contact_shape());
  assert_eq!(preview.output(), &ANY_SHAPE);
  assert!(compiler.handlers().is_registered(&StepKind::Choice));
}

#[test]
fn test_declared_variants_without_a_merge_raise_no_warnings() {
  setup_tracing();
  let declared = Shape::new(ShapeKind::JsonInstance, "")
    .with_description("contacts or companies")
    .with_variants([
      Shape::json_instance(r#"{"first_name":""}"#).with_metadata("name", "contact"),
      Shape::json_instance(r#"{"company":""}"#).with_metadata("name", "company"),
    ]);
  let flow = Flow::new(
    "declared",
    vec![shaped_step("src", None, Some(declared.clone())), Step::new("log", StepKind::Log)],
  );
  let definition = compiler().compile(&flow).unwrap();
  assert!(definition.warnings().is_empty());
  assert_eq!(definition.metadata("log").unwrap().input(), &declared);
}

#[test]
fn test_choice_closing_a_branch_sees_the_step_after_the_outer_choice() {
  setup_tracing();
  let inner = Step::choice(
    "inner",
    vec![Branch::when(
      big_companies(),
      vec![shaped_step("inner-sink", Some(Shape::json_instance(r#"{"a":1}"#)), None)],
    )],
  );
  let flow = Flow::new(
    "nested",
    vec![
      sql_step("sql"),
      routing_choice(vec![Branch::when(big_companies(), vec![inner])]),
      shaped_step("after", Some(Shape::json_instance(r#"{"b":1}"#)), None),
    ],
  );
  let definition = compiler().compile(&flow).unwrap();

  // The inner choice feeds both its own branch and the step after the outer choice.
  let output = definition.metadata("inner").unwrap().output();
  assert!(output.is_union());
  assert_eq!(output.variants.len(), 2);
}
