// conflux/src/packaging.rs

//! Build-time description of a compiled integration: what a project generator
//! needs to package it. Nothing is built here.

use crate::core::step::{Dependency, Integration};
use crate::pipeline::definition::PipelineDefinition;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
  pub artifact_id: String,
  pub name: String,
  pub description: Option<String>,
  /// Union of every flow's dependencies, first-seen order.
  pub dependencies: Vec<Dependency>,
  /// Repository id to URL.
  pub repositories: BTreeMap<String, String>,
}

impl ProjectContext {
  pub fn new(integration: &Integration, definitions: &[PipelineDefinition]) -> Self {
    let mut dependencies: Vec<Dependency> = Vec::new();
    for dependency in definitions.iter().flat_map(|d| d.dependencies()) {
      if !dependencies.contains(dependency) {
        dependencies.push(dependency.clone());
      }
    }
    let artifact_id = match artifact_id_for(&integration.name) {
      id if id.is_empty() => artifact_id_for(&integration.id),
      id => id,
    };
    ProjectContext {
      artifact_id,
      name: integration.name.clone(),
      description: integration.description.clone(),
      dependencies,
      repositories: BTreeMap::new(),
    }
  }

  pub fn with_repository(mut self, id: impl Into<String>, url: impl Into<String>) -> Self {
    self.repositories.insert(id.into(), url.into());
    self
  }
}

/// Lower-case alphanumerics separated by single dashes.
fn artifact_id_for(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
    } else if !out.is_empty() && !out.ends_with('-') {
      out.push('-');
    }
  }
  while out.ends_with('-') {
    out.pop();
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn artifact_id_is_sanitized() {
    assert_eq!(artifact_id_for("  My SQL -> Mock!  "), "my-sql-mock");
    assert_eq!(artifact_id_for("***"), "");
  }

  #[test]
  fn falls_back_to_integration_id() {
    let integration = Integration::new("int-42", "???", Vec::new());
    let project = ProjectContext::new(&integration, &[]).with_repository("central", "https://repo1.maven.org/maven2");
    assert_eq!(project.artifact_id, "int-42");
    assert_eq!(project.repositories.len(), 1);
    assert!(project.dependencies.is_empty());
  }
}
