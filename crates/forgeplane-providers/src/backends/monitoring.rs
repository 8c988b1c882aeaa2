// `monitoring` step backend: registers a dashboard/alert side effect that the
// orchestrator does not itself need to observe the result of. Always
// completes immediately with no outputs.

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use async_trait::async_trait;

pub struct MonitoringBackend;

#[async_trait]
impl StepBackend for MonitoringBackend {
    async fn run(&self, _ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        Ok(StepOutcome::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn always_completes_with_no_outputs() {
        let backend = MonitoringBackend;
        let ctx = StepContext {
            step_name: "register-alert".to_string(),
            config: HashMap::new(),
            env: HashMap::new(),
        };
        let outcome = backend.run(&ctx).await.unwrap();
        assert!(outcome.outputs.is_empty());
    }
}
