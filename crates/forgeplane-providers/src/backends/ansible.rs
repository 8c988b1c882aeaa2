// `ansible` step backend: shells out to `ansible-playbook` against a
// `config.playbook` file, optionally scoped to `config.inventory`.

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

pub struct AnsibleBackend;

#[async_trait]
impl StepBackend for AnsibleBackend {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        let playbook = ctx
            .config
            .get("playbook")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::Permanent("config.playbook is required".to_string()))?;

        let mut args = vec![playbook];
        if let Some(inventory) = ctx.config.get("inventory").and_then(|v| v.as_str()) {
            args.push("-i");
            args.push(inventory);
        }

        let output = Command::new("ansible-playbook")
            .args(&args)
            .envs(&ctx.env)
            .output()
            .await
            .map_err(|e| BackendError::Retryable(format!("failed to spawn ansible-playbook: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(BackendError::Retryable(format!("ansible-playbook failed: {stderr}")));
        }

        let mut outcome = StepOutcome::default();
        outcome.outputs.insert("stdout".to_string(), json!(stdout));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_playbook_is_permanent_failure() {
        let backend = AnsibleBackend;
        let ctx = StepContext {
            step_name: "configure-host".to_string(),
            config: HashMap::new(),
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
