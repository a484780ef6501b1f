// conflux/src/core/step.rs

//! The authored model: steps, flows and integrations, plus the connector
//! action descriptors endpoint steps wrap.

use crate::conditional::predicate::Predicate;
use crate::core::shape::Shape;
use crate::error::{ConfluxError, ConfluxResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag distinguishing what a step does.
///
/// Unrecognised names read from a definition are kept in `Other` so the compiler
/// can reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
  Endpoint,
  Choice,
  Filter,
  Mapper,
  Log,
  Other(String),
}

impl StepKind {
  pub fn as_str(&self) -> &str {
    match self {
      StepKind::Endpoint => "endpoint",
      StepKind::Choice => "choice",
      StepKind::Filter => "ruleFilter",
      StepKind::Mapper => "mapper",
      StepKind::Log => "log",
      StepKind::Other(name) => name.as_str(),
    }
  }
}

impl From<String> for StepKind {
  fn from(name: String) -> Self {
    match name.as_str() {
      "endpoint" => StepKind::Endpoint,
      "choice" => StepKind::Choice,
      "ruleFilter" | "filter" => StepKind::Filter,
      "mapper" => StepKind::Mapper,
      "log" => StepKind::Log,
      _ => StepKind::Other(name),
    }
  }
}

impl From<&str> for StepKind {
  fn from(name: &str) -> Self {
    StepKind::from(name.to_string())
  }
}

impl From<StepKind> for String {
  fn from(kind: StepKind) -> Self {
    kind.as_str().to_string()
  }
}

impl fmt::Display for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Maven-style coordinates of a library an action needs at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
  pub group_id: String,
  pub artifact_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

impl Dependency {
  /// Parses `group:artifact` or `group:artifact:version`.
  pub fn maven(coordinates: &str) -> ConfluxResult<Self> {
    let parts: Vec<&str> = coordinates.split(':').collect();
    match parts.as_slice() {
      [group, artifact] if !group.is_empty() && !artifact.is_empty() => Ok(Dependency {
        group_id: (*group).to_string(),
        artifact_id: (*artifact).to_string(),
        version: None,
      }),
      [group, artifact, version] if !group.is_empty() && !artifact.is_empty() && !version.is_empty() => {
        Ok(Dependency {
          group_id: (*group).to_string(),
          artifact_id: (*artifact).to_string(),
          version: Some((*version).to_string()),
        })
      }
      _ => Err(ConfluxError::configuration(
        "dependency",
        format!("invalid maven coordinates '{}'", coordinates),
      )),
    }
  }
}

impl fmt::Display for Dependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.group_id, self.artifact_id)?;
    if let Some(version) = &self.version {
      write!(f, ":{}", version)?;
    }
    Ok(())
  }
}

/// What a connector declares about one of its actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorDescriptor {
  pub component_scheme: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input_data_shape: Option<Shape>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output_data_shape: Option<Shape>,
  /// Connector-level defaults; step-level properties take precedence.
  pub configured_properties: BTreeMap<String, String>,
  pub required_properties: Vec<String>,
  pub dependencies: Vec<Dependency>,
}

impl ConnectorDescriptor {
  pub fn new(component_scheme: impl Into<String>) -> Self {
    ConnectorDescriptor {
      component_scheme: component_scheme.into(),
      ..Default::default()
    }
  }

  pub fn with_input_shape(mut self, shape: Shape) -> Self {
    self.input_data_shape = Some(shape);
    self
  }

  pub fn with_output_shape(mut self, shape: Shape) -> Self {
    self.output_data_shape = Some(shape);
    self
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.configured_properties.insert(key.into(), value.into());
    self
  }

  pub fn with_required_property(mut self, key: impl Into<String>) -> Self {
    self.required_properties.push(key.into());
    self
  }

  pub fn with_dependency(mut self, dependency: Dependency) -> Self {
    self.dependencies.push(dependency);
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorAction {
  pub id: String,
  /// When absent the action is looked up in the connector registry by `id`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub descriptor: Option<ConnectorDescriptor>,
}

impl ConnectorAction {
  pub fn new(id: impl Into<String>, descriptor: ConnectorDescriptor) -> Self {
    ConnectorAction {
      id: id.into(),
      descriptor: Some(descriptor),
    }
  }

  /// An action known only by id.
  pub fn reference(id: impl Into<String>) -> Self {
    ConnectorAction {
      id: id.into(),
      descriptor: None,
    }
  }
}

/// One outcome of a choice step. A branch without condition is the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<Predicate>,
  #[serde(default)]
  pub steps: Vec<Step>,
}

impl Branch {
  pub fn when(condition: Predicate, steps: Vec<Step>) -> Self {
    Branch {
      condition: Some(condition),
      steps,
    }
  }

  pub fn otherwise(steps: Vec<Step>) -> Self {
    Branch { condition: None, steps }
  }

  pub fn is_default(&self) -> bool {
    self.condition.is_none()
  }
}

/// A node in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
  #[serde(default)]
  pub id: String,
  #[serde(rename = "stepKind")]
  pub kind: StepKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub action: Option<ConnectorAction>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub configured_properties: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub branches: Vec<Branch>,
}

impl Step {
  pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
    Step {
      id: id.into(),
      kind,
      action: None,
      configured_properties: BTreeMap::new(),
      branches: Vec::new(),
    }
  }

  pub fn endpoint(id: impl Into<String>, action: ConnectorAction) -> Self {
    Step::new(id, StepKind::Endpoint).with_action(action)
  }

  pub fn choice(id: impl Into<String>, branches: Vec<Branch>) -> Self {
    Step {
      branches,
      ..Step::new(id, StepKind::Choice)
    }
  }

  pub fn with_action(mut self, action: ConnectorAction) -> Self {
    self.action = Some(action);
    self
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.configured_properties.insert(key.into(), value.into());
    self
  }

  pub fn with_branch(mut self, branch: Branch) -> Self {
    self.branches.push(branch);
    self
  }

  pub fn descriptor(&self) -> Option<&ConnectorDescriptor> {
    self.action.as_ref().and_then(|a| a.descriptor.as_ref())
  }

  /// Declared input shape, if the step's descriptor carries one.
  pub fn input_shape(&self) -> Option<&Shape> {
    self.descriptor().and_then(|d| d.input_data_shape.as_ref())
  }

  /// Declared output shape, if the step's descriptor carries one.
  pub fn output_shape(&self) -> Option<&Shape> {
    self.descriptor().and_then(|d| d.output_data_shape.as_ref())
  }

  /// Copy of this step whose descriptor carries the given shapes.
  /// Steps without an action get one named after their kind.
  pub fn with_shapes(&self, input: Shape, output: Shape) -> Step {
    let mut step = self.clone();
    let action = step
      .action
      .get_or_insert_with(|| ConnectorAction::new(self.kind.as_str(), ConnectorDescriptor::default()));
    let descriptor = action.descriptor.get_or_insert_with(ConnectorDescriptor::default);
    descriptor.input_data_shape = Some(input);
    descriptor.output_data_shape = Some(output);
    step
  }
}

/// An ordered sequence of steps; insertion order is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
  #[serde(default)]
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub steps: Vec<Step>,
}

impl Flow {
  /// Builds a flow, giving every step without an id a `step-{n}` id.
  pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
    let mut flow = Flow {
      id: id.into(),
      name: None,
      steps,
    };
    flow.assign_step_ids();
    flow
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  fn assign_step_ids(&mut self) {
    let mut counter = 0usize;
    assign_ids(&mut self.steps, &mut counter);
  }
}

fn assign_ids(steps: &mut [Step], counter: &mut usize) {
  for step in steps {
    *counter += 1;
    if step.id.is_empty() {
      step.id = format!("step-{}", counter);
    }
    for branch in &mut step.branches {
      assign_ids(&mut branch.steps, counter);
    }
  }
}

/// A named set of flows, as exported by the design-time platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub flows: Vec<Flow>,
}

impl Integration {
  pub fn new(id: impl Into<String>, name: impl Into<String>, flows: Vec<Flow>) -> Self {
    Integration {
      id: id.into(),
      name: name.into(),
      description: None,
      tags: Vec::new(),
      flows,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn with_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags.extend(tags.into_iter().map(Into::into));
    self
  }

  /// Reads an integration export. Flows and steps without ids get generated ones.
  pub fn from_json(json: &str) -> ConfluxResult<Self> {
    let mut integration: Integration = serde_json::from_str(json)
      .map_err(|e| ConfluxError::configuration("integration", format!("unreadable export: {}", e)))?;
    for (idx, flow) in integration.flows.iter_mut().enumerate() {
      if flow.id.is_empty() {
        flow.id = format!("{}-flow-{}", integration.id, idx + 1);
      }
      flow.assign_step_ids();
    }
    Ok(integration)
  }
}
