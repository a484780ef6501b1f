// conflux_core/examples/compile_flow.rs

use conflux::{
  Branch, ConfluxError, ConnectorAction, ConnectorDescriptor, Dependency, Flow, FlowCompiler, Predicate, Rule, Shape,
  StaticConnectorRegistry, Step, StepKind,
};
use conflux::conditional::Op;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<(), ConfluxError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Flow Compilation Example ---");

  // 1. Connectors known to the platform. Steps may reference these by id.
  let orders_shape = Shape::json_instance(r#"{"id":1,"total":0.0,"country":""}"#).with_description("order");
  let registry = StaticConnectorRegistry::new()
    .with_action(ConnectorAction::new(
      "orders-poll",
      ConnectorDescriptor::new("sql")
        .with_output_shape(orders_shape)
        .with_required_property("query")
        .with_dependency(Dependency::maven("io.conflux.connectors:sql-connector:1.0.0")?),
    ))
    .with_action(ConnectorAction::new(
      "eu-queue",
      ConnectorDescriptor::new("amqp").with_input_shape(Shape::json_instance(r#"{"order":1}"#)),
    ));

  // 2. Author a flow: poll orders, route EU orders to a queue, log the rest.
  let flow = Flow::new(
    "orders",
    vec![
      Step::endpoint("poll", ConnectorAction::reference("orders-poll")).with_property("query", "SELECT * FROM orders"),
      Step::choice(
        "by-region",
        vec![
          Branch::when(
            Predicate::any(vec![
              Rule::new("country", Op::Equals, "DE"),
              Rule::new("country", Op::Equals, "FR"),
            ]),
            vec![
              Step::new("to-queue-shape", StepKind::Mapper).with_property("mappings", r#"{"order": "/id"}"#),
              Step::endpoint("eu", ConnectorAction::reference("eu-queue")),
            ],
          ),
          Branch::otherwise(vec![Step::new("other", StepKind::Log).with_property("message", "skipping ${body}")]),
        ],
      ),
    ],
  )
  .with_name("Order routing");

  // 3. Compile and inspect the resolved shapes.
  let compiler = FlowCompiler::new(Arc::new(registry));
  let definition = compiler.compile(&flow)?;

  for (step_id, metadata) in definition.all_metadata() {
    info!(%step_id, input = %metadata.input(), output = %metadata.output(), "Resolved shapes");
  }
  for dependency in definition.dependencies() {
    info!(%dependency, "Dependency");
  }
  for warning in definition.warnings() {
    info!(%warning, "Shape warning");
  }

  info!("--- Flow Compilation Example Finished ---");
  Ok(())
}
