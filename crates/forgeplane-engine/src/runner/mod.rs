// WorkflowRunner abstracts *where* a resolved workflow execution actually
// runs, separate from the Executor (C6) that drives one execution's step
// DAG. Swapping `workflow_runner_mode: temporal` in Config moves executions
// onto durable Temporal-backed dispatch without Phase A (engine.rs) caring
// which runner is behind the trait object.

pub mod inprocess;
#[cfg(feature = "temporal")]
pub mod temporal;

use crate::error::EngineError;
use crate::executor::Executor;
use async_trait::async_trait;
use forgeplane_contracts::Workflow;
use forgeplane_core::{Config, RunnerMode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a runner needs to start one workflow execution. `execution_id`
/// is always pre-created by Phase A (via `attach_workflow`), so runners only
/// ever drive an execution that already exists in storage.
#[derive(Clone)]
pub struct WorkflowInput {
    pub execution_id: Uuid,
    pub application_name: String,
    pub workflow: Workflow,
    pub inputs: HashMap<String, Value>,
}

#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn start_workflow(&self, input: WorkflowInput) -> Result<(), EngineError>;
    async fn cancel_workflow(&self, execution_id: Uuid) -> Result<(), EngineError>;
    async fn is_running(&self, execution_id: Uuid) -> bool;
    async fn active_count(&self) -> usize;
    async fn shutdown(&self);
}

pub fn create_runner(config: &Config, executor: Executor) -> Arc<dyn WorkflowRunner> {
    match config.workflow_runner_mode {
        RunnerMode::InProcess => {
            tracing::info!("using in-process workflow runner");
            Arc::new(inprocess::InProcessRunner::new(executor))
        }
        RunnerMode::Temporal => {
            #[cfg(feature = "temporal")]
            {
                tracing::info!("using Temporal-backed workflow runner");
                Arc::new(temporal::TemporalRunner::new(executor))
            }
            #[cfg(not(feature = "temporal"))]
            {
                tracing::warn!(
                    "workflow_runner_mode=temporal but the 'temporal' feature is not compiled in; \
                     falling back to the in-process runner"
                );
                Arc::new(inprocess::InProcessRunner::new(executor))
            }
        }
    }
}
