// Temporal-backed workflow runner (feature = "temporal").
//
// Note: full Temporal SDK integration means registering this crate's step
// types as Temporal activities and running a worker against a task queue.
// The Rust SDK is still alpha, so this is a durable-wrapper shim: it tracks
// executions the same way the in-process runner does and stamps a Temporal
// workflow ID into the execution's metadata so the shape of the integration
// is in place, without a live connection to `temporal-sdk-core` yet.

use super::{WorkflowInput, WorkflowRunner};
use crate::error::EngineError;
use crate::executor::Executor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct TemporalRunner {
    executor: Executor,
    running: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl TemporalRunner {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            running: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl WorkflowRunner for TemporalRunner {
    async fn start_workflow(&self, input: WorkflowInput) -> Result<(), EngineError> {
        let workflow_id = format!("forgeplane-execution-{}", input.execution_id);
        tracing::info!(execution_id = %input.execution_id, workflow_id = %workflow_id, "starting durable workflow execution");

        self.running.write().await.insert(input.execution_id, workflow_id);

        let executor = self.executor.clone();
        let running = self.running.clone();
        let execution_id = input.execution_id;

        tokio::spawn(async move {
            let result = executor
                .run_attached(&input.application_name, execution_id, &input.workflow, input.inputs)
                .await;
            if let Err(e) = result {
                tracing::error!(execution_id = %execution_id, error = %e, "durable workflow execution failed");
            }
            running.write().await.remove(&execution_id);
        });

        Ok(())
    }

    async fn cancel_workflow(&self, execution_id: Uuid) -> Result<(), EngineError> {
        // A real integration would send a Temporal cancel signal here; for
        // now we just drop local tracking, matching in-process semantics.
        self.running.write().await.remove(&execution_id);
        Ok(())
    }

    async fn is_running(&self, execution_id: Uuid) -> bool {
        self.running.read().await.contains_key(&execution_id)
    }

    async fn active_count(&self) -> usize {
        self.running.read().await.len()
    }

    async fn shutdown(&self) {
        self.running.write().await.clear();
    }
}
