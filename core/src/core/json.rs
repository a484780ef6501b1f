// conflux/src/core/json.rs

//! Structural comparison of JSON documents.
//!
//! Object members are compared regardless of order, array elements position by
//! position. In `Lenient` mode the actual document may carry members the expected
//! one does not mention.

use crate::error::{ConfluxError, ConfluxResult};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
  Lenient,
  Strict,
}

/// Returns the path of the first difference, or `None` when the documents match.
pub fn json_mismatch(expected: &Value, actual: &Value, mode: CompareMode) -> Option<String> {
  compare(expected, actual, mode, "$")
}

pub fn json_matches(expected: &Value, actual: &Value, mode: CompareMode) -> bool {
  json_mismatch(expected, actual, mode).is_none()
}

/// Parses both documents first; unparsable input is an error, not a mismatch.
pub fn json_str_matches(expected: &str, actual: &str, mode: CompareMode) -> ConfluxResult<bool> {
  let parse = |label: &str, text: &str| {
    serde_json::from_str::<Value>(text)
      .map_err(|e| ConfluxError::Internal(format!("{} document is not valid JSON: {}", label, e)))
  };
  Ok(json_matches(&parse("expected", expected)?, &parse("actual", actual)?, mode))
}

fn compare(expected: &Value, actual: &Value, mode: CompareMode, path: &str) -> Option<String> {
  match (expected, actual) {
    (Value::Object(exp), Value::Object(act)) => {
      for (key, exp_value) in exp {
        let child = format!("{}.{}", path, key);
        match act.get(key) {
          Some(act_value) => {
            if let Some(diff) = compare(exp_value, act_value, mode, &child) {
              return Some(diff);
            }
          }
          None => return Some(format!("{}: missing", child)),
        }
      }
      if mode == CompareMode::Strict {
        if let Some(extra) = act.keys().find(|k| !exp.contains_key(*k)) {
          return Some(format!("{}.{}: unexpected", path, extra));
        }
      }
      None
    }
    (Value::Array(exp), Value::Array(act)) => {
      if exp.len() != act.len() {
        return Some(format!("{}: expected {} elements, found {}", path, exp.len(), act.len()));
      }
      exp
        .iter()
        .zip(act)
        .enumerate()
        .find_map(|(idx, (e, a))| compare(e, a, mode, &format!("{}[{}]", path, idx)))
    }
    (Value::Number(e), Value::Number(a)) => {
      if e == a || e.as_f64() == a.as_f64() {
        None
      } else {
        Some(format!("{}: expected {}, found {}", path, e, a))
      }
    }
    (e, a) if e == a => None,
    (e, a) => Some(format!("{}: expected {}, found {}", path, e, a)),
  }
}
