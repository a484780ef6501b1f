// conflux/src/pipeline/definition.rs

//! The compiled, executable form of a flow: an ordered list of actions with
//! resolved configuration and shapes.

use crate::conditional::mapping::Mapping;
use crate::conditional::predicate::Predicate;
use crate::core::shape::Shape;
use crate::core::step::Dependency;
use crate::metadata::DynamicActionMetadata;
use std::collections::BTreeMap;
use std::fmt;

/// What an action does at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
  /// Delivered to an endpoint opened by the transport for `component_scheme`.
  Endpoint { component_scheme: String },
  /// Drops messages the predicate rejects.
  Filter { predicate: Predicate },
  /// Replaces the body with the mapped document.
  Mapper { mapping: Mapping },
  /// Logs a rendered template and passes the message on.
  Log { template: String },
  /// Routes each message through the first branch whose condition holds.
  Choice { branches: Vec<CompiledBranch> },
}

impl ActionKind {
  pub fn name(&self) -> &'static str {
    match self {
      ActionKind::Endpoint { .. } => "endpoint",
      ActionKind::Filter { .. } => "filter",
      ActionKind::Mapper { .. } => "mapper",
      ActionKind::Log { .. } => "log",
      ActionKind::Choice { .. } => "choice",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBranch {
  /// `None` for the default branch.
  pub condition: Option<Predicate>,
  pub actions: Vec<ActionDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDef {
  pub step_id: String,
  pub kind: ActionKind,
  /// Step-level properties overlaid on connector defaults.
  pub configuration: BTreeMap<String, String>,
  pub metadata: DynamicActionMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeSide {
  Input,
  Output,
}

impl fmt::Display for ShapeSide {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShapeSide::Input => f.write_str("input"),
      ShapeSide::Output => f.write_str("output"),
    }
  }
}

/// Shapes that could not be unified and were collected as variants instead.
/// Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeConflictWarning {
  pub step_id: String,
  pub side: ShapeSide,
  pub shape: Shape,
}

impl fmt::Display for ShapeConflictWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "step '{}' {} shape merges {} incompatible variants into {}",
      self.step_id,
      self.side,
      self.shape.variants.len(),
      self.shape.kind
    )
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
  pub(crate) flow_id: String,
  pub(crate) flow_name: Option<String>,
  pub(crate) actions: Vec<ActionDef>,
  pub(crate) metadata: BTreeMap<String, DynamicActionMetadata>,
  pub(crate) dependencies: Vec<Dependency>,
  pub(crate) warnings: Vec<ShapeConflictWarning>,
}

impl PipelineDefinition {
  pub fn flow_id(&self) -> &str {
    &self.flow_id
  }

  pub fn flow_name(&self) -> Option<&str> {
    self.flow_name.as_deref()
  }

  pub fn actions(&self) -> &[ActionDef] {
    &self.actions
  }

  /// Resolved shapes for any step of the flow, branches included.
  pub fn metadata(&self, step_id: &str) -> Option<&DynamicActionMetadata> {
    self.metadata.get(step_id)
  }

  pub fn all_metadata(&self) -> &BTreeMap<String, DynamicActionMetadata> {
    &self.metadata
  }

  pub fn dependencies(&self) -> &[Dependency] {
    &self.dependencies
  }

  pub fn warnings(&self) -> &[ShapeConflictWarning] {
    &self.warnings
  }

  /// Finds an action anywhere in the tree.
  pub fn action(&self, step_id: &str) -> Option<&ActionDef> {
    fn find<'a>(actions: &'a [ActionDef], step_id: &str) -> Option<&'a ActionDef> {
      actions.iter().find_map(|action| {
        if action.step_id == step_id {
          return Some(action);
        }
        match &action.kind {
          ActionKind::Choice { branches } => branches.iter().find_map(|b| find(&b.actions, step_id)),
          _ => None,
        }
      })
    }
    find(&self.actions, step_id)
  }

  /// Endpoint actions in declaration order, descending into branches.
  pub fn endpoint_actions(&self) -> Vec<&ActionDef> {
    fn collect<'a>(actions: &'a [ActionDef], out: &mut Vec<&'a ActionDef>) {
      for action in actions {
        match &action.kind {
          ActionKind::Endpoint { .. } => out.push(action),
          ActionKind::Choice { branches } => {
            for branch in branches {
              collect(&branch.actions, out);
            }
          }
          _ => {}
        }
      }
    }
    let mut out = Vec::new();
    collect(&self.actions, &mut out);
    out
  }
}
