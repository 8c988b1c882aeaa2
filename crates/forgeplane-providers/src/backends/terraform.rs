// `terraform` step backend: shells out to the `terraform` CLI in
// `config.working_dir`, running `config.operation` (init/plan/apply/destroy/
// output). Manifest validation already guarantees both keys are present and
// `operation` is one of the allowed values.

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

pub struct TerraformBackend;

#[async_trait]
impl StepBackend for TerraformBackend {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        let working_dir = ctx
            .config
            .get("working_dir")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::Permanent("config.working_dir is required".to_string()))?;
        let operation = ctx
            .config
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::Permanent("config.operation is required".to_string()))?;

        let mut args = vec![operation, "-no-color"];
        if matches!(operation, "apply" | "destroy") {
            args.push("-auto-approve");
        }

        let output = Command::new("terraform")
            .args(&args)
            .current_dir(working_dir)
            .envs(&ctx.env)
            .output()
            .await
            .map_err(|e| BackendError::Retryable(format!("failed to spawn terraform: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(BackendError::Retryable(format!(
                "terraform {operation} failed: {stderr}"
            )));
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
    async fn missing_working_dir_is_permanent_failure() {
        let backend = TerraformBackend;
        let mut config = HashMap::new();
        config.insert("operation".to_string(), json!("plan"));
        let ctx = StepContext {
            step_name: "plan-infra".to_string(),
            config,
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }

    #[tokio::test]
    async fn missing_operation_is_permanent_failure() {
        let backend = TerraformBackend;
        let mut config = HashMap::new();
        config.insert("working_dir".to_string(), json!("/tmp"));
        let ctx = StepContext {
            step_name: "plan-infra".to_string(),
            config,
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
