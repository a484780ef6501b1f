// conflux/src/config.rs

//! Runtime settings, read from the environment (and `.env` when present).

use crate::error::{ConfluxError, ConfluxResult};
use std::time::Duration;
use tracing::{event, Level};

pub const STOP_GRACE_ENV: &str = "CONFLUX_STOP_GRACE_MS";
pub const MOCK_WAIT_ENV: &str = "CONFLUX_MOCK_WAIT_MS";

const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_MOCK_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
  /// How long `stop()` waits for in-flight routes before abandoning them.
  pub stop_grace_period: Duration,
  /// Default wait of mock endpoints' `assert_received`.
  pub mock_wait_timeout: Duration,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    RuntimeConfig {
      stop_grace_period: DEFAULT_STOP_GRACE,
      mock_wait_timeout: DEFAULT_MOCK_WAIT,
    }
  }
}

impl RuntimeConfig {
  /// Loads `.env` if one exists, then reads the process environment.
  pub fn from_env() -> ConfluxResult<Self> {
    match dotenvy::dotenv() {
      Ok(path) => event!(Level::DEBUG, path = %path.display(), "Loaded .env file."),
      Err(e) if e.not_found() => {}
      Err(e) => event!(Level::WARN, error = %e, "Ignoring unreadable .env file."),
    }
    Self::from_vars(|key| std::env::var(key).ok())
  }

  /// Reads settings through `lookup`; unset keys keep their defaults.
  pub fn from_vars<F>(lookup: F) -> ConfluxResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = RuntimeConfig::default();
    if let Some(raw) = lookup(STOP_GRACE_ENV) {
      config.stop_grace_period = parse_millis(STOP_GRACE_ENV, &raw)?;
    }
    if let Some(raw) = lookup(MOCK_WAIT_ENV) {
      config.mock_wait_timeout = parse_millis(MOCK_WAIT_ENV, &raw)?;
    }
    Ok(config)
  }

  pub fn with_stop_grace_period(mut self, grace: Duration) -> Self {
    self.stop_grace_period = grace;
    self
  }

  pub fn with_mock_wait_timeout(mut self, wait: Duration) -> Self {
    self.mock_wait_timeout = wait;
    self
  }
}

fn parse_millis(key: &str, raw: &str) -> ConfluxResult<Duration> {
  raw
    .trim()
    .parse::<u64>()
    .map(Duration::from_millis)
    .map_err(|e| ConfluxError::configuration(key, format!("expected milliseconds, found '{}': {}", raw, e)))
}
