// conflux/src/core/message.rs

//! The unit of data flowing through a running pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header set on messages delivered to an error sink.
pub const ERROR_HEADER: &str = "conflux.error";
/// Header naming the step where routing failed.
pub const FAILED_STEP_HEADER: &str = "conflux.failedStep";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
  pub body: Value,
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  /// Output recorded for each step the message (or its ancestors) passed through.
  #[serde(default)]
  pub buckets: BTreeMap<String, Value>,
}

impl Message {
  pub fn new(body: Value) -> Self {
    Message {
      body,
      ..Default::default()
    }
  }

  pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(key.into(), value.into());
    self
  }

  pub fn header(&self, key: &str) -> Option<&str> {
    self.headers.get(key).map(String::as_str)
  }

  /// A message derived from this one: same headers and buckets, new body.
  pub fn derive(&self, body: Value) -> Message {
    Message {
      body,
      headers: self.headers.clone(),
      buckets: self.buckets.clone(),
    }
  }

  pub(crate) fn record_bucket(&mut self, step_id: &str) {
    self.buckets.insert(step_id.to_string(), self.body.clone());
  }

  pub fn bucket(&self, step_id: &str) -> Option<&Value> {
    self.buckets.get(step_id)
  }
}
