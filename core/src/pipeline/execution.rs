// conflux/src/pipeline/execution.rs

//! Routing of messages through a started pipeline.

use crate::core::message::{Message, ERROR_HEADER, FAILED_STEP_HEADER};
use crate::error::{ConfluxError, ConfluxResult};
use crate::pipeline::definition::{ActionDef, ActionKind};
use crate::pipeline::lifecycle::{InFlight, Pipeline};
use anyhow::anyhow;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::watch;
use tracing::{event, instrument, Level};

type RouteFuture<'a> = Pin<Box<dyn Future<Output = Vec<Message>> + Send + 'a>>;

/// Outcome of routing one inbound message.
#[derive(Debug, Default)]
pub struct RouteReport {
  /// Messages that came out of the last action.
  pub delivered: Vec<Message>,
  /// One entry per message that failed along the way.
  pub failures: Vec<ConfluxError>,
  pub filtered: usize,
  pub dead_lettered: usize,
}

impl RouteReport {
  pub fn is_clean(&self) -> bool {
    self.failures.is_empty()
  }
}

impl Pipeline {
  /// Pushes `message` through the actions in order. Failures of individual
  /// messages are reported, not returned; the error cases here are a pipeline
  /// that is not accepting messages, or a route abandoned by `stop`.
  #[instrument(name = "Pipeline::route", skip_all, fields(pipeline = %self.name), err(Display))]
  pub async fn route(&self, message: Message) -> ConfluxResult<RouteReport> {
    let _flight = InFlight::enter(self);
    let state = *self.state.lock();
    if !state.accepts_messages() {
      return Err(self.invalid_state("route", state));
    }

    let abandon = self.shutdown.subscribe();
    let definition = self.definition.clone();
    let mut report = RouteReport::default();
    let delivered = tokio::select! {
      _ = abandoned(abandon) => {
        event!(Level::WARN, "Route abandoned by shutdown.");
        return Err(ConfluxError::RouteAbandoned { pipeline: self.name.clone() });
      }
      delivered = self.run_actions(&definition.actions, vec![message], &mut report) => delivered,
    };
    report.delivered = delivered;
    event!(
      Level::DEBUG,
      delivered = report.delivered.len(),
      failures = report.failures.len(),
      filtered = report.filtered,
      "Route finished."
    );
    Ok(report)
  }

  /// Runs `messages` through `actions`, one action at a time, keeping the
  /// emission order. Returns what leaves the last action.
  fn run_actions<'a>(
    &'a self,
    actions: &'a [ActionDef],
    messages: Vec<Message>,
    report: &'a mut RouteReport,
  ) -> RouteFuture<'a> {
    Box::pin(async move {
      let mut current = messages;
      for action in actions {
        if current.is_empty() {
          break;
        }
        event!(Level::TRACE, step_id = %action.step_id, kind = action.kind.name(), batch = current.len(), "Applying action.");
        let mut produced = Vec::with_capacity(current.len());
        for message in current {
          if let ActionKind::Choice { branches } = &action.kind {
            let branch = branches
              .iter()
              .find(|b| b.condition.as_ref().map_or(true, |p| p.test(&message.body)));
            match branch {
              Some(branch) => {
                let out = self.run_actions(&branch.actions, vec![message], report).await;
                produced.extend(out);
              }
              None => produced.push(message),
            }
            continue;
          }

          let original = message.clone();
          match self.apply(action, message).await {
            Ok(Some(out)) => produced.extend(out),
            Ok(None) => report.filtered += 1,
            Err(source) => {
              let error = ConfluxError::RuntimeRouting {
                step_id: action.step_id.clone(),
                source,
              };
              event!(Level::WARN, error = %error, "Message failed.");
              if self.reject(original, &action.step_id, &error).await {
                report.dead_lettered += 1;
              }
              report.failures.push(error);
            }
          }
        }
        current = produced;
      }
      current
    })
  }

  /// `Ok(None)` when a filter drops the message.
  async fn apply(&self, action: &ActionDef, message: Message) -> anyhow::Result<Option<Vec<Message>>> {
    match &action.kind {
      ActionKind::Endpoint { .. } => {
        let endpoint = self
          .endpoint(&action.step_id)
          .ok_or_else(|| anyhow!("endpoint '{}' is not started", action.step_id))?;
        let mut out = endpoint.send(message).await?;
        for produced in &mut out {
          produced.record_bucket(&action.step_id);
        }
        Ok(Some(out))
      }
      ActionKind::Filter { predicate } => {
        if predicate.test(&message.body) {
          Ok(Some(vec![message]))
        } else {
          event!(Level::TRACE, step_id = %action.step_id, "Message filtered out.");
          Ok(None)
        }
      }
      ActionKind::Mapper { mapping } => {
        let body = mapping.apply(&message)?;
        let mut mapped = message.derive(body);
        mapped.record_bucket(&action.step_id);
        Ok(Some(vec![mapped]))
      }
      ActionKind::Log { template } => {
        event!(Level::INFO, step_id = %action.step_id, "{}", render(template, &message));
        Ok(Some(vec![message]))
      }
      ActionKind::Choice { .. } => Err(anyhow!("choice '{}' cannot be applied as a single action", action.step_id)),
    }
  }

  /// Hands a failed message to the error sink. Returns whether it was accepted.
  async fn reject(&self, message: Message, step_id: &str, error: &ConfluxError) -> bool {
    let Some(sink) = self.error_sink.clone() else {
      event!(Level::ERROR, %step_id, error = %error, "No error sink configured, dropping failed message.");
      return false;
    };
    let dead = message
      .with_header(ERROR_HEADER, error.to_string())
      .with_header(FAILED_STEP_HEADER, step_id);
    match sink.send(dead).await {
      Ok(_) => true,
      Err(e) => {
        event!(Level::ERROR, %step_id, error = %e, "Error sink rejected failed message.");
        false
      }
    }
  }
}

/// Resolves once `stop` gives up on in-flight routes.
async fn abandoned(mut signal: watch::Receiver<bool>) {
  loop {
    let abandon = *signal.borrow_and_update();
    if abandon {
      return;
    }
    if signal.changed().await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}

/// Expands `${body}` and `${header.NAME}`; unknown placeholders render empty.
pub(crate) fn render(template: &str, message: &Message) -> String {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;
  while let Some(start) = rest.find("${") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];
    let Some(end) = after.find('}') else {
      out.push_str(&rest[start..]);
      return out;
    };
    let key = &after[..end];
    if key == "body" {
      out.push_str(&text_of(&message.body));
    } else if let Some(name) = key.strip_prefix("header.") {
      out.push_str(message.header(name).unwrap_or_default());
    }
    rest = &after[end + 1..];
  }
  out.push_str(rest);
  out
}

fn text_of(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn render_expands_body_and_headers() {
    let message = Message::new(json!({"id": 7})).with_header("source", "crm");
    assert_eq!(render("got ${body} from ${header.source}", &message), r#"got {"id":7} from crm"#);
  }

  #[test]
  fn render_keeps_unterminated_placeholder() {
    let message = Message::new(json!("x"));
    assert_eq!(render("a ${body} ${oops", &message), "a x ${oops");
    assert_eq!(render("${header.missing}!", &message), "!");
  }
}
