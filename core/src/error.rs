// conflux/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfluxError {
  /// Compile-time problem with a step definition: unknown kind, missing action
  /// descriptor, malformed or missing configured property.
  #[error("Configuration error for step '{step_id}': {message}")]
  Configuration { step_id: String, message: String },

  /// Lookup of a deployed integration, or of one of its flows, came up empty.
  #[error("Flow not deployed: {}", describe_missing(.integration_id, .flow_id.as_deref()))]
  FlowNotFound {
    integration_id: String,
    flow_id: Option<String>,
  },

  /// A single message failed inside a running pipeline.
  #[error("Routing failed at step '{step_id}'. Source: {source}")]
  RuntimeRouting {
    step_id: String,
    #[source]
    source: AnyhowError,
  },

  /// An endpoint could not be started or stopped.
  #[error("Transport failure on endpoint '{endpoint}'. Source: {source}")]
  Transport {
    endpoint: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Pipeline shutdown reported {} failure(s): {}", .failures.len(), summarize(.failures))]
  Shutdown { failures: Vec<ConfluxError> },

  #[error("Pipeline '{pipeline}' cannot {operation} while {state}")]
  InvalidState {
    pipeline: String,
    operation: String,
    state: String,
  },

  #[error("Route abandoned by shutdown of pipeline '{pipeline}'")]
  RouteAbandoned { pipeline: String },

  #[error("Timed out after {waited_ms}ms waiting for {what}")]
  Timeout { what: String, waited_ms: u128 },

  #[error("Error in user-provided handler or external operation. Source: {source}")]
  External {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal conflux error: {0}")]
  Internal(String),
}

fn summarize(failures: &[ConfluxError]) -> String {
  failures
    .iter()
    .map(|f| f.to_string())
    .collect::<Vec<_>>()
    .join("; ")
}

fn describe_missing(integration_id: &str, flow_id: Option<&str>) -> String {
  match flow_id {
    Some(flow_id) => format!("'{}' in integration '{}'", flow_id, integration_id),
    None => format!("integration '{}' is not deployed", integration_id),
  }
}

impl ConfluxError {
  pub fn configuration(step_id: impl Into<String>, message: impl Into<String>) -> Self {
    ConfluxError::Configuration {
      step_id: step_id.into(),
      message: message.into(),
    }
  }

  pub fn is_configuration(&self) -> bool {
    matches!(self, ConfluxError::Configuration { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ConfluxError::FlowNotFound { .. })
  }
}

impl From<AnyhowError> for ConfluxError {
  fn from(err: AnyhowError) -> Self {
    ConfluxError::External { source: err }
  }
}

pub type ConfluxResult<T, E = ConfluxError> = std::result::Result<T, E>;
