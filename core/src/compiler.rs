// conflux/src/compiler.rs

//! Turns an authored `Flow` into a `PipelineDefinition`.
//!
//! Steps are visited in declaration order. Each step's shapes are resolved by
//! the handler registered for its kind, looking at the steps that feed it and
//! the steps it feeds. Resolved shapes are written back onto the step so later
//! steps see them as declared.
//!
//! Neighbours:
//!  - previous: the step before, or after a choice, the last step of every
//!    branch plus the choice's own previous steps when a path bypasses all
//!    branches. The first step of a branch sees the choice's previous steps.
//!  - next: the step after, and for a choice also the first step of every branch.
//!    The last step of a branch sees the step after the choice.

use crate::conditional::mapping::Mapping;
use crate::conditional::predicate::Predicate;
use crate::connector::registry::{ConnectorRegistry, StaticConnectorRegistry};
use crate::core::step::{Dependency, Flow, Integration, Step, StepKind};
use crate::error::{ConfluxError, ConfluxResult};
use crate::metadata::{DynamicActionMetadata, HandlerRegistry};
use crate::pipeline::definition::{
  ActionDef, ActionKind, CompiledBranch, PipelineDefinition, ShapeConflictWarning, ShapeSide,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Configured property holding a log step's template.
pub const LOG_MESSAGE_PROPERTY: &str = "message";
const DEFAULT_LOG_TEMPLATE: &str = "${body}";

pub struct FlowCompiler {
  handlers: HandlerRegistry,
  connectors: Arc<dyn ConnectorRegistry>,
}

/// Accumulated while compiling one flow; never shared between compilations.
#[derive(Default)]
struct CompileState {
  step_ids: HashSet<String>,
  metadata: BTreeMap<String, DynamicActionMetadata>,
  dependencies: Vec<Dependency>,
  warnings: Vec<ShapeConflictWarning>,
}

impl CompileState {
  fn claim_id(&mut self, step: &Step) -> ConfluxResult<()> {
    if step.id.is_empty() {
      return Err(ConfluxError::configuration("<unnamed>", format!("{} step has no id", step.kind)));
    }
    if !self.step_ids.insert(step.id.clone()) {
      return Err(ConfluxError::configuration(step.id.clone(), "duplicate step id"));
    }
    Ok(())
  }

  fn add_dependencies(&mut self, dependencies: &[Dependency]) {
    for dependency in dependencies {
      if !self.dependencies.contains(dependency) {
        self.dependencies.push(dependency.clone());
      }
    }
  }

  fn note_conflicts(&mut self, step_id: &str, metadata: &DynamicActionMetadata) {
    for (side, shape) in [(ShapeSide::Input, metadata.input()), (ShapeSide::Output, metadata.output())] {
      if shape.is_union() {
        let warning = ShapeConflictWarning {
          step_id: step_id.to_string(),
          side,
          shape: shape.clone(),
        };
        event!(Level::WARN, %warning, "Shape conflict degraded to variants.");
        self.warnings.push(warning);
      }
    }
  }
}

impl FlowCompiler {
  pub fn new(connectors: Arc<dyn ConnectorRegistry>) -> Self {
    FlowCompiler {
      handlers: HandlerRegistry::with_defaults(),
      connectors,
    }
  }

  pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
    self.handlers = handlers;
    self
  }

  pub fn handlers(&self) -> &HandlerRegistry {
    &self.handlers
  }

  #[instrument(
    name = "FlowCompiler::compile",
    skip_all,
    fields(flow_id = %flow.id, num_steps = flow.steps.len()),
    err(Display)
  )]
  pub fn compile(&self, flow: &Flow) -> ConfluxResult<PipelineDefinition> {
    if flow.steps.is_empty() {
      return Err(ConfluxError::configuration(flow.id.clone(), "flow has no steps"));
    }
    let mut state = CompileState::default();
    let (actions, _) = self.compile_sequence(&flow.steps, &[], None, &mut state)?;
    event!(
      Level::DEBUG,
      actions = actions.len(),
      dependencies = state.dependencies.len(),
      warnings = state.warnings.len(),
      "Flow compiled."
    );
    Ok(PipelineDefinition {
      flow_id: flow.id.clone(),
      flow_name: flow.name.clone(),
      actions,
      metadata: state.metadata,
      dependencies: state.dependencies,
      warnings: state.warnings,
    })
  }

  /// Compiles every flow of an integration; the first failure aborts.
  pub fn compile_integration(&self, integration: &Integration) -> ConfluxResult<Vec<PipelineDefinition>> {
    event!(Level::DEBUG, integration_id = %integration.id, flows = integration.flows.len(), "Compiling integration.");
    integration.flows.iter().map(|flow| self.compile(flow)).collect()
  }

  /// Design-time preview of a single step's shapes.
  pub fn create_metadata(&self, step: &Step, previous: &[Step], next: &[Step]) -> ConfluxResult<DynamicActionMetadata> {
    let handler = self.handlers.handler_for(step)?;
    let resolve = |steps: &[Step]| -> Vec<Step> { steps.iter().map(|s| self.with_registered_descriptor(s)).collect() };
    let step = self.with_registered_descriptor(step);
    Ok(handler.create_metadata(&step, &resolve(previous), &resolve(next)))
  }

  /// Returns the compiled actions and the steps whose output leaves the sequence.
  /// `after` is the step that receives that output, if any.
  fn compile_sequence(
    &self,
    steps: &[Step],
    inbound: &[Step],
    after: Option<&Step>,
    state: &mut CompileState,
  ) -> ConfluxResult<(Vec<ActionDef>, Vec<Step>)> {
    let mut previous: Vec<Step> = inbound.to_vec();
    let mut actions = Vec::with_capacity(steps.len());

    for (idx, authored) in steps.iter().enumerate() {
      state.claim_id(authored)?;
      let handler = self.handlers.handler_for(authored)?;
      let step = self.resolve_step(authored)?;

      let following = steps.get(idx + 1).or(after);
      let next: Vec<Step> = match step.kind {
        StepKind::Choice => step
          .branches
          .iter()
          .filter_map(|b| b.steps.first())
          .chain(following)
          .map(|s| self.with_registered_descriptor(s))
          .collect(),
        _ => following.map(|s| self.with_registered_descriptor(s)).into_iter().collect(),
      };

      let metadata = match DynamicActionMetadata::declared_by(&step) {
        Some(declared) if declared.is_complete() => handler.handle(declared),
        _ => handler.create_metadata(&step, &previous, &next),
      };
      event!(
        Level::DEBUG,
        step_id = %step.id,
        step_kind = %step.kind,
        input = %metadata.input(),
        output = %metadata.output(),
        "Step shapes resolved."
      );
      state.note_conflicts(&step.id, &metadata);
      state.metadata.insert(step.id.clone(), metadata.clone());

      let configuration = resolve_configuration(&step)?;
      let enriched = step.with_shapes(metadata.input().clone(), metadata.output().clone());

      let (kind, outbound) = match &step.kind {
        StepKind::Endpoint => {
          let descriptor = step
            .descriptor()
            .ok_or_else(|| ConfluxError::Internal(format!("endpoint '{}' lost its descriptor", step.id)))?;
          state.add_dependencies(&descriptor.dependencies);
          let kind = ActionKind::Endpoint {
            component_scheme: descriptor.component_scheme.clone(),
          };
          (kind, vec![enriched])
        }
        StepKind::Filter => {
          let predicate = Predicate::from_properties(&step.id, &configuration)?;
          (ActionKind::Filter { predicate }, vec![enriched])
        }
        StepKind::Mapper => {
          let mapping = Mapping::from_properties(&step.id, &configuration)?;
          (ActionKind::Mapper { mapping }, vec![enriched])
        }
        StepKind::Log => {
          let template = configuration
            .get(LOG_MESSAGE_PROPERTY)
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_TEMPLATE.to_string());
          (ActionKind::Log { template }, vec![enriched])
        }
        StepKind::Choice => {
          let (branches, tails) = self.compile_branches(&step, &previous, following, state)?;
          (ActionKind::Choice { branches }, tails)
        }
        StepKind::Other(name) => {
          return Err(ConfluxError::configuration(
            step.id.clone(),
            format!("step kind '{}' has no runtime action", name),
          ))
        }
      };

      actions.push(ActionDef {
        step_id: step.id.clone(),
        kind,
        configuration,
        metadata,
      });
      previous = outbound;
    }

    Ok((actions, previous))
  }

  fn compile_branches(
    &self,
    choice: &Step,
    inbound: &[Step],
    after: Option<&Step>,
    state: &mut CompileState,
  ) -> ConfluxResult<(Vec<CompiledBranch>, Vec<Step>)> {
    if choice.branches.is_empty() {
      return Err(ConfluxError::configuration(choice.id.clone(), "choice step has no branches"));
    }
    let defaults = choice.branches.iter().filter(|b| b.is_default()).count();
    let default_is_last = choice.branches.last().is_some_and(|b| b.is_default());
    if defaults > 1 || (defaults == 1 && !default_is_last) {
      return Err(ConfluxError::configuration(
        choice.id.clone(),
        "a choice allows one default branch and it must come last",
      ));
    }

    let mut compiled = Vec::with_capacity(choice.branches.len());
    let mut tails = Vec::new();
    let mut bypassed = defaults == 0;
    for branch in &choice.branches {
      let (actions, outbound) = self.compile_sequence(&branch.steps, inbound, after, state)?;
      if branch.steps.is_empty() {
        bypassed = true;
      } else {
        tails.extend(outbound);
      }
      compiled.push(CompiledBranch {
        condition: branch.condition.clone(),
        actions,
      });
    }
    if bypassed {
      tails.extend(inbound.iter().cloned());
    }
    Ok((compiled, tails))
  }

  /// Fills in the descriptor of an action known only by id, when the registry
  /// knows it. Inline descriptors win.
  fn with_registered_descriptor(&self, step: &Step) -> Step {
    match &step.action {
      Some(action) if action.descriptor.is_none() => match self.connectors.action(&action.id) {
        Some(registered) => step.clone().with_action(registered),
        None => step.clone(),
      },
      _ => step.clone(),
    }
  }

  fn resolve_step(&self, step: &Step) -> ConfluxResult<Step> {
    let resolved = self.with_registered_descriptor(step);
    if resolved.kind == StepKind::Endpoint && resolved.descriptor().is_none() {
      let message = match &step.action {
        Some(action) => format!("connector action '{}' is not registered", action.id),
        None => "endpoint step has no action".to_string(),
      };
      return Err(ConfluxError::configuration(step.id.clone(), message));
    }
    Ok(resolved)
  }
}

impl Default for FlowCompiler {
  fn default() -> Self {
    FlowCompiler::new(Arc::new(StaticConnectorRegistry::new()))
  }
}

/// Connector defaults overlaid with step-level properties, then checked against
/// the descriptor's required properties.
fn resolve_configuration(step: &Step) -> ConfluxResult<BTreeMap<String, String>> {
  let mut configuration = step
    .descriptor()
    .map(|d| d.configured_properties.clone())
    .unwrap_or_default();
  configuration.extend(step.configured_properties.iter().map(|(k, v)| (k.clone(), v.clone())));

  if let Some(descriptor) = step.descriptor() {
    for required in &descriptor.required_properties {
      if configuration.get(required).map_or(true, |v| v.trim().is_empty()) {
        return Err(ConfluxError::configuration(
          step.id.clone(),
          format!("required property '{}' is not configured", required),
        ));
      }
    }
  }
  Ok(configuration)
}
