// In-process workflow runner backed by Tokio tasks. Fast, but a crash of
// the host process loses any execution it had in flight — those executions
// are recovered by C7 Phase B, which resets the owning resource to
// `requested` and lets Phase A relaunch it from scratch.

use super::{WorkflowInput, WorkflowRunner};
use crate::error::EngineError;
use crate::executor::Executor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct InProcessRunner {
    executor: Executor,
    active: Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>,
}

impl InProcessRunner {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl WorkflowRunner for InProcessRunner {
    async fn start_workflow(&self, input: WorkflowInput) -> Result<(), EngineError> {
        tracing::info!(execution_id = %input.execution_id, workflow = %input.workflow.name, "starting in-process workflow execution");

        let executor = self.executor.clone();
        let active = self.active.clone();
        let execution_id = input.execution_id;

        let handle = tokio::spawn(async move {
            let result = executor
                .run_attached(&input.application_name, execution_id, &input.workflow, input.inputs)
                .await;
            if let Err(e) = result {
                tracing::error!(execution_id = %execution_id, error = %e, "workflow execution failed");
            }
            active.write().await.remove(&execution_id);
        });

        self.active.write().await.insert(execution_id, handle);
        Ok(())
    }

    async fn cancel_workflow(&self, execution_id: Uuid) -> Result<(), EngineError> {
        let mut active = self.active.write().await;
        if let Some(handle) = active.remove(&execution_id) {
            handle.abort();
            tracing::info!(execution_id = %execution_id, "aborted in-process workflow");
        }
        Ok(())
    }

    async fn is_running(&self, execution_id: Uuid) -> bool {
        self.active.read().await.contains_key(&execution_id)
    }

    async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    async fn shutdown(&self) {
        let mut active = self.active.write().await;
        for (execution_id, handle) in active.drain() {
            tracing::info!(execution_id = %execution_id, "aborting workflow on shutdown");
            handle.abort();
        }
    }
}
