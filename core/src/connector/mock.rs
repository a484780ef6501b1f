// conflux/src/connector/mock.rs

//! Capture endpoints for verifying what a pipeline delivers.

use super::{Endpoint, EndpointConfig, Transport};
use crate::core::message::Message;
use crate::error::{ConfluxError, ConfluxResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{event, Level};

pub const MOCK_SCHEME: &str = "mock";
/// Property naming the capture endpoint; defaults to the step id.
pub const MOCK_NAME_PROPERTY: &str = "name";

/// Records every message it receives and passes it on unchanged.
#[derive(Debug)]
pub struct MockEndpoint {
  name: String,
  received: Mutex<Vec<Message>>,
  arrived: Notify,
  result_wait: Duration,
  stopped: AtomicBool,
}

impl MockEndpoint {
  pub fn new(name: impl Into<String>, result_wait: Duration) -> Self {
    MockEndpoint {
      name: name.into(),
      received: Mutex::new(Vec::new()),
      arrived: Notify::new(),
      result_wait,
      stopped: AtomicBool::new(false),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn received(&self) -> Vec<Message> {
    self.received.lock().clone()
  }

  pub fn received_count(&self) -> usize {
    self.received.lock().len()
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped.load(Ordering::SeqCst)
  }

  /// Waits until at least `count` messages arrived, failing with `Timeout`
  /// once `timeout` elapses. Returns the messages received so far.
  pub async fn await_messages(&self, count: usize, timeout: Duration) -> ConfluxResult<Vec<Message>> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
      // Registered before the check so a concurrent arrival is not missed.
      let notified = self.arrived.notified();
      {
        let received = self.received.lock();
        if received.len() >= count {
          return Ok(received.clone());
        }
      }
      if tokio::time::timeout_at(deadline, notified).await.is_err() {
        let received = self.received_count();
        event!(Level::WARN, mock = %self.name, expected = count, received, "Mock wait timed out.");
        return Err(ConfluxError::Timeout {
          what: format!("{} message(s) on mock:{} (received {})", count, self.name, received),
          waited_ms: timeout.as_millis(),
        });
      }
    }
  }

  /// `await_messages` with this endpoint's configured result wait.
  pub async fn assert_received(&self, count: usize) -> ConfluxResult<Vec<Message>> {
    self.await_messages(count, self.result_wait).await
  }

  pub fn reset(&self) {
    self.received.lock().clear();
  }
}

#[async_trait]
impl Endpoint for MockEndpoint {
  async fn send(&self, message: Message) -> anyhow::Result<Vec<Message>> {
    self.received.lock().push(message.clone());
    self.arrived.notify_waiters();
    event!(Level::TRACE, mock = %self.name, "Mock endpoint received a message.");
    Ok(vec![message])
  }

  async fn stop(&self) -> anyhow::Result<()> {
    self.stopped.store(true, Ordering::SeqCst);
    Ok(())
  }
}

/// Hands out named `MockEndpoint`s. Endpoints can be fetched before the pipeline
/// starts; starting a step with the same name reuses them.
#[derive(Debug)]
pub struct MockTransport {
  endpoints: Mutex<HashMap<String, Arc<MockEndpoint>>>,
  result_wait: Duration,
}

impl MockTransport {
  pub fn new(result_wait: Duration) -> Self {
    MockTransport {
      endpoints: Mutex::new(HashMap::new()),
      result_wait,
    }
  }

  pub fn endpoint(&self, name: &str) -> Arc<MockEndpoint> {
    self
      .endpoints
      .lock()
      .entry(name.to_string())
      .or_insert_with(|| Arc::new(MockEndpoint::new(name, self.result_wait)))
      .clone()
  }
}

#[async_trait]
impl Transport for MockTransport {
  async fn start(&self, config: &EndpointConfig) -> anyhow::Result<Arc<dyn Endpoint>> {
    let name = config.property(MOCK_NAME_PROPERTY).unwrap_or(&config.step_id);
    event!(Level::DEBUG, mock = %name, step_id = %config.step_id, "Starting mock endpoint.");
    let endpoint: Arc<dyn Endpoint> = self.endpoint(name);
    Ok(endpoint)
  }
}
