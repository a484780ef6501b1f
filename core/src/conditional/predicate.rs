// conflux/src/conditional/predicate.rs

//! Rule-based predicates evaluated against message bodies. Used by filter steps
//! and by the conditions of choice branches.

use crate::error::{ConfluxError, ConfluxResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Configured property selecting how rules combine.
pub const PREDICATE_PROPERTY: &str = "predicate";
/// Configured property holding the JSON array of rules.
pub const RULES_PROPERTY: &str = "rules";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
  /// All rules must hold.
  #[default]
  Every,
  /// At least one rule must hold.
  Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
  #[serde(rename = "==")]
  Equals,
  #[serde(rename = "!=")]
  NotEquals,
  #[serde(rename = ">")]
  GreaterThan,
  #[serde(rename = ">=")]
  GreaterOrEqual,
  #[serde(rename = "<")]
  LessThan,
  #[serde(rename = "<=")]
  LessOrEqual,
  #[serde(rename = "contains")]
  Contains,
  #[serde(rename = "!contains")]
  NotContains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
  /// Dotted field path (`address.city`, `items.0`) or JSON pointer (`/address/city`).
  pub path: String,
  pub op: Op,
  #[serde(default)]
  pub value: String,
}

impl Rule {
  pub fn new(path: impl Into<String>, op: Op, value: impl Into<String>) -> Self {
    Rule {
      path: path.into(),
      op,
      value: value.into(),
    }
  }

  pub fn test(&self, body: &Value) -> bool {
    let field = lookup(body, &self.path);
    match (self.op, field) {
      (Op::NotEquals, None) | (Op::NotContains, None) => true,
      (_, None) => false,
      (Op::Equals, Some(v)) => compare(v, &self.value) == Some(std::cmp::Ordering::Equal),
      (Op::NotEquals, Some(v)) => compare(v, &self.value) != Some(std::cmp::Ordering::Equal),
      (Op::GreaterThan, Some(v)) => compare(v, &self.value).is_some_and(|o| o.is_gt()),
      (Op::GreaterOrEqual, Some(v)) => compare(v, &self.value).is_some_and(|o| o.is_ge()),
      (Op::LessThan, Some(v)) => compare(v, &self.value).is_some_and(|o| o.is_lt()),
      (Op::LessOrEqual, Some(v)) => compare(v, &self.value).is_some_and(|o| o.is_le()),
      (Op::Contains, Some(v)) => contains(v, &self.value),
      (Op::NotContains, Some(v)) => !contains(v, &self.value),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
  #[serde(default)]
  pub mode: MatchMode,
  #[serde(default)]
  pub rules: Vec<Rule>,
}

impl Predicate {
  pub fn every(rules: Vec<Rule>) -> Self {
    Predicate {
      mode: MatchMode::Every,
      rules,
    }
  }

  pub fn any(rules: Vec<Rule>) -> Self {
    Predicate {
      mode: MatchMode::Any,
      rules,
    }
  }

  /// Reads `predicate` (`every` | `any`, default `every`) and `rules` from a
  /// step's configured properties.
  pub fn from_properties(step_id: &str, properties: &BTreeMap<String, String>) -> ConfluxResult<Self> {
    let mode = match properties.get(PREDICATE_PROPERTY).map(|s| s.trim()) {
      None | Some("") | Some("every") => MatchMode::Every,
      Some("any") => MatchMode::Any,
      Some(other) => {
        return Err(ConfluxError::configuration(
          step_id,
          format!("'{}' must be 'every' or 'any', found '{}'", PREDICATE_PROPERTY, other),
        ))
      }
    };
    let raw = properties
      .get(RULES_PROPERTY)
      .ok_or_else(|| ConfluxError::configuration(step_id, format!("missing '{}' property", RULES_PROPERTY)))?;
    let rules: Vec<Rule> = serde_json::from_str(raw)
      .map_err(|e| ConfluxError::configuration(step_id, format!("malformed '{}': {}", RULES_PROPERTY, e)))?;
    Ok(Predicate { mode, rules })
  }

  pub fn test(&self, body: &Value) -> bool {
    match self.mode {
      MatchMode::Every => self.rules.iter().all(|r| r.test(body)),
      MatchMode::Any => self.rules.iter().any(|r| r.test(body)),
    }
  }
}

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
  if path.starts_with('/') {
    return body.pointer(path);
  }
  path
    .split('.')
    .filter(|segment| !segment.is_empty())
    .try_fold(body, |current, segment| match current {
      Value::Object(map) => map.get(segment),
      Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    })
}

fn as_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Numeric comparison when both sides parse as numbers, text comparison otherwise.
fn compare(field: &Value, expected: &str) -> Option<std::cmp::Ordering> {
  let text = as_text(field);
  match (text.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
    (Ok(a), Ok(b)) => a.partial_cmp(&b),
    _ => Some(text.as_str().cmp(expected)),
  }
}

fn contains(field: &Value, needle: &str) -> bool {
  match field {
    Value::Array(items) => items.iter().any(|item| as_text(item) == needle),
    Value::Object(map) => map.contains_key(needle),
    other => as_text(other).contains(needle),
  }
}
