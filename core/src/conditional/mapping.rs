// conflux/src/conditional/mapping.rs

//! Field mappings applied by mapper steps.
//!
//! The `mappings` property is a JSON object from target field to source. A
//! source is either a JSON pointer into the current body (`/first_name`) or a
//! pointer into the recorded output of an earlier step (`sql-1:/company`).

use crate::core::message::Message;
use crate::error::{ConfluxError, ConfluxResult};
use anyhow::anyhow;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const MAPPINGS_PROPERTY: &str = "mappings";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
  /// Step whose recorded output is read; `None` reads the current body.
  pub bucket: Option<String>,
  pub pointer: String,
}

impl SourceRef {
  pub fn parse(raw: &str) -> Option<Self> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('/') {
      return Some(SourceRef {
        bucket: None,
        pointer: raw.to_string(),
      });
    }
    let (bucket, pointer) = raw.split_once(':')?;
    if bucket.is_empty() || !(pointer.is_empty() || pointer.starts_with('/')) {
      return None;
    }
    Some(SourceRef {
      bucket: Some(bucket.to_string()),
      pointer: pointer.to_string(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
  pub target: String,
  pub source: SourceRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
  pub fields: Vec<FieldMapping>,
}

impl Mapping {
  pub fn from_properties(step_id: &str, properties: &BTreeMap<String, String>) -> ConfluxResult<Self> {
    let raw = properties
      .get(MAPPINGS_PROPERTY)
      .ok_or_else(|| ConfluxError::configuration(step_id, format!("missing '{}' property", MAPPINGS_PROPERTY)))?;
    Self::parse(raw).map_err(|message| ConfluxError::configuration(step_id, message))
  }

  /// Parses the JSON form. Target order follows the document.
  pub fn parse(raw: &str) -> Result<Self, String> {
    let document: Map<String, Value> =
      serde_json::from_str(raw).map_err(|e| format!("malformed '{}': {}", MAPPINGS_PROPERTY, e))?;
    let mut fields = Vec::with_capacity(document.len());
    for (target, source) in document {
      let source = source
        .as_str()
        .and_then(SourceRef::parse)
        .ok_or_else(|| format!("invalid source for target '{}': {}", target, source))?;
      fields.push(FieldMapping { target, source });
    }
    Ok(Mapping { fields })
  }

  /// Example document listing the target fields, used as the mapper's output
  /// specification.
  pub fn output_specification(&self) -> String {
    let document: Map<String, Value> = self
      .fields
      .iter()
      .map(|f| (f.target.clone(), Value::Null))
      .collect();
    Value::Object(document).to_string()
  }

  /// Builds the mapped body. Missing fields map to `null`; a missing bucket fails.
  pub fn apply(&self, message: &Message) -> anyhow::Result<Value> {
    let mut out = Map::with_capacity(self.fields.len());
    for field in &self.fields {
      let document = match &field.source.bucket {
        Some(step_id) => message
          .bucket(step_id)
          .ok_or_else(|| anyhow!("no data recorded for step '{}'", step_id))?,
        None => &message.body,
      };
      let value = document.pointer(&field.source.pointer).cloned().unwrap_or(Value::Null);
      out.insert(field.target.clone(), value);
    }
    Ok(Value::Object(out))
  }
}
