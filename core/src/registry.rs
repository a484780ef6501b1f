// conflux/src/registry.rs

//! Defines `Conflux`, the registry of deployed integrations. Deploying compiles
//! every flow of an integration and starts one pipeline per flow; undeploying
//! stops them all.

use crate::compiler::FlowCompiler;
use crate::config::RuntimeConfig;
use crate::connector::{ConnectorRegistry, Endpoint, TransportRegistry};
use crate::core::message::Message;
use crate::core::step::Integration;
use crate::error::{ConfluxError, ConfluxResult};
use crate::packaging::ProjectContext;
use crate::pipeline::{Pipeline, RouteReport};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

struct Deployment {
  /// One pipeline per flow, in flow order.
  pipelines: Vec<(String, Arc<Pipeline>)>,
  project: ProjectContext,
}

pub struct Conflux {
  compiler: FlowCompiler,
  transports: TransportRegistry,
  config: RuntimeConfig,
  error_sink: Option<Arc<dyn Endpoint>>,
  deployments: Mutex<HashMap<String, Deployment>>,
}

impl Conflux {
  pub fn new(connectors: Arc<dyn ConnectorRegistry>, transports: TransportRegistry, config: RuntimeConfig) -> Self {
    Conflux {
      compiler: FlowCompiler::new(connectors),
      transports,
      config,
      error_sink: None,
      deployments: Mutex::new(HashMap::new()),
    }
  }

  pub fn with_compiler(mut self, compiler: FlowCompiler) -> Self {
    self.compiler = compiler;
    self
  }

  /// Error sink handed to every pipeline deployed afterwards.
  pub fn with_error_sink(mut self, sink: Arc<dyn Endpoint>) -> Self {
    self.error_sink = Some(sink);
    self
  }

  pub fn compiler(&self) -> &FlowCompiler {
    &self.compiler
  }

  /// Compiles and starts every flow. If any flow fails to compile nothing is
  /// started; if one fails to start, the ones already started are stopped.
  #[instrument(name = "Conflux::deploy", skip_all, fields(integration_id = %integration.id), err(Display))]
  pub async fn deploy(&self, integration: &Integration) -> ConfluxResult<ProjectContext> {
    if self.deployments.lock().contains_key(&integration.id) {
      return Err(ConfluxError::InvalidState {
        pipeline: integration.id.clone(),
        operation: "deploy".to_string(),
        state: "deployed".to_string(),
      });
    }

    let definitions = self.compiler.compile_integration(integration)?;
    let project = ProjectContext::new(integration, &definitions);

    let mut started: Vec<(String, Arc<Pipeline>)> = Vec::with_capacity(definitions.len());
    for definition in definitions {
      let flow_id = definition.flow_id().to_string();
      let mut pipeline = Pipeline::new(definition, self.transports.clone(), self.config);
      if let Some(sink) = &self.error_sink {
        pipeline = pipeline.with_error_sink(sink.clone());
      }
      let pipeline = Arc::new(pipeline);
      let outcome = pipeline.start().await;
      started.push((flow_id, pipeline));
      if let Err(e) = outcome {
        event!(Level::ERROR, error = %e, "Deployment failed, stopping started flows.");
        if let Err(cleanup) = stop_all(&started).await {
          event!(Level::WARN, error = %cleanup, "Cleanup after failed deployment reported errors.");
        }
        return Err(e);
      }
    }

    let rejected = {
      let mut deployments = self.deployments.lock();
      match deployments.entry(integration.id.clone()) {
        Entry::Occupied(_) => Some(started),
        Entry::Vacant(slot) => {
          slot.insert(Deployment {
            pipelines: started,
            project: project.clone(),
          });
          None
        }
      }
    };
    if let Some(started) = rejected {
      if let Err(cleanup) = stop_all(&started).await {
        event!(Level::WARN, error = %cleanup, "Cleanup after concurrent deployment reported errors.");
      }
      return Err(ConfluxError::InvalidState {
        pipeline: integration.id.clone(),
        operation: "deploy".to_string(),
        state: "deployed".to_string(),
      });
    }
    event!(Level::INFO, flows = integration.flows.len(), "Integration deployed.");
    Ok(project)
  }

  pub fn pipeline(&self, integration_id: &str, flow_id: &str) -> Option<Arc<Pipeline>> {
    self
      .deployments
      .lock()
      .get(integration_id)?
      .pipelines
      .iter()
      .find(|(id, _)| id == flow_id)
      .map(|(_, pipeline)| pipeline.clone())
  }

  pub fn project(&self, integration_id: &str) -> Option<ProjectContext> {
    self.deployments.lock().get(integration_id).map(|d| d.project.clone())
  }

  /// Routes `message` into the pipeline of one deployed flow.
  pub async fn route(&self, integration_id: &str, flow_id: &str, message: Message) -> ConfluxResult<RouteReport> {
    let pipeline = self.pipeline(integration_id, flow_id).ok_or_else(|| {
      event!(Level::ERROR, %integration_id, %flow_id, "No deployed flow.");
      ConfluxError::FlowNotFound {
        integration_id: integration_id.to_string(),
        flow_id: Some(flow_id.to_string()),
      }
    })?;
    pipeline.route(message).await
  }

  /// Stops every pipeline of the integration, last flow first.
  #[instrument(name = "Conflux::undeploy", skip(self), err(Display))]
  pub async fn undeploy(&self, integration_id: &str) -> ConfluxResult<()> {
    let deployment = self.deployments.lock().remove(integration_id).ok_or_else(|| {
      ConfluxError::FlowNotFound {
        integration_id: integration_id.to_string(),
        flow_id: None,
      }
    })?;
    stop_all(&deployment.pipelines).await?;
    event!(Level::INFO, "Integration undeployed.");
    Ok(())
  }

  pub fn deployed_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.deployments.lock().keys().cloned().collect();
    ids.sort();
    ids
  }
}

/// Stops pipelines in reverse order, flattening their failures into one error.
async fn stop_all(pipelines: &[(String, Arc<Pipeline>)]) -> ConfluxResult<()> {
  let mut failures = Vec::new();
  for (_, pipeline) in pipelines.iter().rev() {
    match pipeline.stop().await {
      Ok(()) => {}
      Err(ConfluxError::Shutdown { failures: nested }) => failures.extend(nested),
      Err(e) => failures.push(e),
    }
  }
  if failures.is_empty() {
    Ok(())
  } else {
    Err(ConfluxError::Shutdown { failures })
  }
}
