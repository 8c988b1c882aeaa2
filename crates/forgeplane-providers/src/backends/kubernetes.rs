// `kubernetes` step backend: shells out to `kubectl apply` for a declared
// manifest and/or namespace. A manifest-only step applies the named file; a
// namespace-only step scopes a server-side operation (e.g. `kubectl get`)
// without a local manifest. Manifest validation guarantees at least one of
// `config.manifest` / `config.namespace` is present.

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

pub struct KubernetesBackend;

#[async_trait]
impl StepBackend for KubernetesBackend {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        let manifest = ctx.config.get("manifest").and_then(|v| v.as_str());
        let namespace = ctx.config.get("namespace").and_then(|v| v.as_str());

        if manifest.is_none() && namespace.is_none() {
            return Err(BackendError::Permanent(
                "config.manifest or config.namespace is required".to_string(),
            ));
        }

        let mut args: Vec<&str> = vec!["apply"];
        if let Some(ns) = namespace {
            args.push("-n");
            args.push(ns);
        }
        if let Some(manifest_path) = manifest {
            args.push("-f");
            args.push(manifest_path);
        } else {
            // Namespace-only steps create the namespace itself.
            args = vec!["create", "namespace", namespace.unwrap(), "--dry-run=client", "-o=yaml"];
        }

        let output = Command::new("kubectl")
            .args(&args)
            .envs(&ctx.env)
            .output()
            .await
            .map_err(|e| BackendError::Retryable(format!("failed to spawn kubectl: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(BackendError::Retryable(format!("kubectl apply failed: {stderr}")));
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
    async fn missing_manifest_and_namespace_is_permanent_failure() {
        let backend = KubernetesBackend;
        let ctx = StepContext {
            step_name: "apply-deployment".to_string(),
            config: HashMap::new(),
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
