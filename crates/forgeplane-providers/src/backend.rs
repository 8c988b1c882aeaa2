// Step backend trait (C6's collaborator): model each step type as a
// capability `{ run(ctx) -> Result }`, dispatched by the `step_type` tag in
// `forgeplane_contracts::Step`, never by inheritance.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct StepContext {
    pub step_name: String,
    /// Already variable-interpolated config map; the backend never sees a
    /// raw `${...}` token.
    pub config: HashMap<String, Value>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub outputs: HashMap<String, Value>,
}

/// Transient vs permanent failure, per §7's execution/backend error
/// category. Only `Retryable` is eligible for `Step::retry`.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Retryable(String),
    #[error("{0}")]
    Permanent(String),
}

#[async_trait]
pub trait StepBackend: Send + Sync {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError>;
}
