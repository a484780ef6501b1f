// conflux/src/pipeline/lifecycle.rs

//! The running form of a `PipelineDefinition`: owns the endpoints it started
//! and moves through `Created -> Started -> Stopping -> Stopped` (or `Failed`).

use crate::config::RuntimeConfig;
use crate::connector::{Endpoint, EndpointConfig, TransportRegistry};
use crate::core::control::PipelineState;
use crate::error::{ConfluxError, ConfluxResult};
use crate::pipeline::definition::{ActionKind, PipelineDefinition};
use anyhow::anyhow;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{event, instrument, Level};

/// Extra time abandoned routes get to observe the shutdown signal.
const ABANDON_WAIT: Duration = Duration::from_millis(250);

pub struct Pipeline {
  pub(crate) name: String,
  pub(crate) definition: Arc<PipelineDefinition>,
  transports: TransportRegistry,
  config: RuntimeConfig,
  pub(crate) error_sink: Option<Arc<dyn Endpoint>>,
  pub(crate) state: Mutex<PipelineState>,
  /// Started endpoints keyed by step id, in start order.
  endpoints: RwLock<Vec<(String, Arc<dyn Endpoint>)>>,
  /// Serialises `start` and `stop`.
  lifecycle: tokio::sync::Mutex<()>,
  in_flight: AtomicUsize,
  idle: Notify,
  pub(crate) shutdown: watch::Sender<bool>,
}

/// Counts a `route` call as in flight for as long as it lives.
pub(crate) struct InFlight<'a> {
  pipeline: &'a Pipeline,
}

impl<'a> InFlight<'a> {
  pub(crate) fn enter(pipeline: &'a Pipeline) -> Self {
    pipeline.in_flight.fetch_add(1, Ordering::SeqCst);
    InFlight { pipeline }
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if self.pipeline.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
      self.pipeline.idle.notify_waiters();
    }
  }
}

impl Pipeline {
  pub fn new(definition: PipelineDefinition, transports: TransportRegistry, config: RuntimeConfig) -> Self {
    let name = definition.flow_name().unwrap_or(definition.flow_id()).to_string();
    let (shutdown, _) = watch::channel(false);
    Pipeline {
      name,
      definition: Arc::new(definition),
      transports,
      config,
      error_sink: None,
      state: Mutex::new(PipelineState::Created),
      endpoints: RwLock::new(Vec::new()),
      lifecycle: tokio::sync::Mutex::new(()),
      in_flight: AtomicUsize::new(0),
      idle: Notify::new(),
      shutdown,
    }
  }

  /// Failed messages go to `sink` with the error in their headers instead of
  /// being logged and dropped.
  pub fn with_error_sink(mut self, sink: Arc<dyn Endpoint>) -> Self {
    self.error_sink = Some(sink);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn definition(&self) -> &PipelineDefinition {
    &self.definition
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// `Routing` while started with messages in flight.
  pub fn state(&self) -> PipelineState {
    let state = *self.state.lock();
    if state == PipelineState::Started && self.in_flight.load(Ordering::SeqCst) > 0 {
      PipelineState::Routing
    } else {
      state
    }
  }

  /// The endpoint started for `step_id`, if any.
  pub fn endpoint(&self, step_id: &str) -> Option<Arc<dyn Endpoint>> {
    self
      .endpoints
      .read()
      .iter()
      .find(|(id, _)| id == step_id)
      .map(|(_, endpoint)| endpoint.clone())
  }

  pub fn started_endpoints(&self) -> usize {
    self.endpoints.read().len()
  }

  /// Starts every endpoint action in declaration order. A no-op when already
  /// started. On failure the pipeline is `Failed`; call `stop` to release the
  /// endpoints that did start.
  #[instrument(name = "Pipeline::start", skip_all, fields(pipeline = %self.name), err(Display))]
  pub async fn start(&self) -> ConfluxResult<()> {
    let _guard = self.lifecycle.lock().await;
    let current = *self.state.lock();
    match current {
      PipelineState::Created => {}
      PipelineState::Started | PipelineState::Routing => {
        event!(Level::DEBUG, "Pipeline already started.");
        return Ok(());
      }
      other => return Err(self.invalid_state("start", other)),
    }

    let definition = self.definition.clone();
    for action in definition.endpoint_actions() {
      let ActionKind::Endpoint { component_scheme } = &action.kind else {
        continue;
      };
      let config = EndpointConfig {
        step_id: action.step_id.clone(),
        component_scheme: component_scheme.clone(),
        properties: action.configuration.clone(),
      };
      let started = match self.transports.get(component_scheme) {
        Some(transport) => transport.start(&config).await,
        None => Err(anyhow!("no transport registered for scheme '{}'", component_scheme)),
      };
      match started {
        Ok(endpoint) => {
          event!(Level::DEBUG, endpoint = %config.uri(), "Endpoint started.");
          self.endpoints.write().push((action.step_id.clone(), endpoint));
        }
        Err(source) => {
          *self.state.lock() = PipelineState::Failed;
          event!(Level::ERROR, endpoint = %config.uri(), error = %source, "Endpoint failed to start.");
          return Err(ConfluxError::Transport {
            endpoint: config.uri(),
            source,
          });
        }
      }
    }

    *self.state.lock() = PipelineState::Started;
    event!(Level::INFO, endpoints = self.started_endpoints(), "Pipeline started.");
    Ok(())
  }

  /// Rejects new routes, waits for in-flight ones up to the grace period,
  /// abandons the rest and stops every started endpoint in reverse order.
  /// Endpoint stop failures are collected into one `Shutdown` error.
  #[instrument(name = "Pipeline::stop", skip_all, fields(pipeline = %self.name), err(Display))]
  pub async fn stop(&self) -> ConfluxResult<()> {
    let _guard = self.lifecycle.lock().await;
    {
      let mut state = self.state.lock();
      match *state {
        PipelineState::Stopped => return Ok(()),
        PipelineState::Created => {
          *state = PipelineState::Stopped;
          return Ok(());
        }
        _ => *state = PipelineState::Stopping,
      }
    }

    if !self.drain(self.config.stop_grace_period).await {
      event!(
        Level::WARN,
        in_flight = self.in_flight.load(Ordering::SeqCst),
        grace_ms = self.config.stop_grace_period.as_millis() as u64,
        "Grace period elapsed, abandoning in-flight routes."
      );
      self.shutdown.send_replace(true);
      self.drain(ABANDON_WAIT).await;
    }

    let endpoints = std::mem::take(&mut *self.endpoints.write());
    let mut failures = Vec::new();
    for (step_id, endpoint) in endpoints.into_iter().rev() {
      if let Err(source) = endpoint.stop().await {
        event!(Level::ERROR, %step_id, error = %source, "Endpoint failed to stop.");
        failures.push(ConfluxError::Transport {
          endpoint: step_id,
          source,
        });
      }
    }
    *self.state.lock() = PipelineState::Stopped;

    if failures.is_empty() {
      event!(Level::INFO, "Pipeline stopped.");
      Ok(())
    } else {
      Err(ConfluxError::Shutdown { failures })
    }
  }

  /// Starts the pipeline, runs `body`, and stops it whatever the outcome. The
  /// body's error wins over a stop error.
  pub async fn with_started<F, Fut, T>(&self, body: F) -> ConfluxResult<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ConfluxResult<T>>,
  {
    if let Err(e) = self.start().await {
      if let Err(stop_err) = self.stop().await {
        event!(Level::WARN, error = %stop_err, "Cleanup after failed start reported errors.");
      }
      return Err(e);
    }
    let outcome = body().await;
    let stopped = self.stop().await;
    match (outcome, stopped) {
      (Ok(value), Ok(())) => Ok(value),
      (Ok(_), Err(stop_err)) => Err(stop_err),
      (Err(e), Ok(())) => Err(e),
      (Err(e), Err(stop_err)) => {
        event!(Level::WARN, error = %stop_err, "Stop failed after an error in the scoped body.");
        Err(e)
      }
    }
  }

  pub(crate) fn invalid_state(&self, operation: &str, state: PipelineState) -> ConfluxError {
    ConfluxError::InvalidState {
      pipeline: self.name.clone(),
      operation: operation.to_string(),
      state: state.to_string(),
    }
  }

  /// Waits until nothing is in flight. Returns false if `within` elapsed first.
  async fn drain(&self, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
      let idle = self.idle.notified();
      if self.in_flight.load(Ordering::SeqCst) == 0 {
        return true;
      }
      if tokio::time::timeout_at(deadline, idle).await.is_err() {
        return self.in_flight.load(Ordering::SeqCst) == 0;
      }
    }
  }
}

impl Drop for Pipeline {
  fn drop(&mut self) {
    let leaked = self.endpoints.get_mut().len();
    if leaked > 0 {
      event!(Level::WARN, pipeline = %self.name, endpoints = leaked, "Pipeline dropped without stop(); endpoints not released.");
    }
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("name", &self.name)
      .field("flow_id", &self.definition.flow_id())
      .field("state", &self.state())
      .field("endpoints", &self.started_endpoints())
      .finish()
  }
}
