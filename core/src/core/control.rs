// conflux/src/core/control.rs

//! Lifecycle states of a pipeline instance.

use std::fmt;

/// `Created -> Started -> (Routing)* -> Stopped`, with `Failed` reachable from
/// a startup error. `Stopping` covers the drain window of `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
  Created,
  Started,
  /// Started with at least one message in flight.
  Routing,
  Stopping,
  Stopped,
  Failed,
}

impl PipelineState {
  /// Whether `route()` is accepted in this state.
  pub fn accepts_messages(self) -> bool {
    matches!(self, PipelineState::Started | PipelineState::Routing)
  }
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      PipelineState::Created => "created",
      PipelineState::Started => "started",
      PipelineState::Routing => "routing",
      PipelineState::Stopping => "stopping",
      PipelineState::Stopped => "stopped",
      PipelineState::Failed => "failed",
    };
    f.write_str(s)
  }
}
