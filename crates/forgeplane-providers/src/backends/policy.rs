// `policy` step backend: spawns `config.script` via the shell, capturing
// stdout/stderr/exit code. Also backs `validation` steps whose config names
// a `script` rather than an `endpoint` — both run exactly the same way.

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

pub struct PolicyBackend;

#[async_trait]
impl StepBackend for PolicyBackend {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        let script = ctx
            .config
            .get("script")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::Permanent("config.script is required".to_string()))?;

        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        for (key, value) in &ctx.env {
            command.env(key, value);
        }

        let output = command
            .output()
            .await
            .map_err(|e| BackendError::Retryable(format!("failed to spawn script: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(BackendError::Permanent(format!(
                "script exited with status {code}: {stderr}"
            )));
        }

        let mut outcome = StepOutcome::default();
        outcome.outputs.insert("stdout".to_string(), json!(stdout));
        outcome.outputs.insert("stderr".to_string(), json!(stderr));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn successful_script_captures_stdout() {
        let backend = PolicyBackend;
        let mut config = HashMap::new();
        config.insert("script".to_string(), json!("echo hello"));
        let ctx = StepContext {
            step_name: "create-db".to_string(),
            config,
            env: HashMap::new(),
        };
        let outcome = backend.run(&ctx).await.unwrap();
        assert_eq!(outcome.outputs["stdout"], json!("hello\n"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_permanent_failure() {
        let backend = PolicyBackend;
        let mut config = HashMap::new();
        config.insert("script".to_string(), json!("exit 1"));
        let ctx = StepContext {
            step_name: "create-db".to_string(),
            config,
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }

    #[tokio::test]
    async fn missing_script_is_permanent_failure() {
        let backend = PolicyBackend;
        let ctx = StepContext {
            step_name: "create-db".to_string(),
            config: HashMap::new(),
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
