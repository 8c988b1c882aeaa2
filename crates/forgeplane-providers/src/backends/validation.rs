// `validation` step backend: a thin dispatcher over the two shapes a
// validation step can take — script-style (same as `policy`) or
// endpoint-style (same as `http`). Manifest validation guarantees exactly
// one of `config.script` / `config.endpoint` is present.

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use crate::backends::http::HttpBackend;
use crate::backends::policy::PolicyBackend;
use async_trait::async_trait;

pub struct ValidationBackend {
    policy: PolicyBackend,
    http: HttpBackend,
}

impl ValidationBackend {
    pub fn new() -> Self {
        Self {
            policy: PolicyBackend,
            http: HttpBackend::new(),
        }
    }
}

impl Default for ValidationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepBackend for ValidationBackend {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        if ctx.config.contains_key("script") {
            self.policy.run(ctx).await
        } else if ctx.config.contains_key("endpoint") {
            self.http.run(ctx).await
        } else {
            Err(BackendError::Permanent(
                "config.script or config.endpoint is required".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn dispatches_to_policy_when_script_present() {
        let backend = ValidationBackend::new();
        let mut config = HashMap::new();
        config.insert("script".to_string(), json!("exit 0"));
        let ctx = StepContext {
            step_name: "check-quota".to_string(),
            config,
            env: HashMap::new(),
        };
        backend.run(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn neither_key_is_permanent_failure() {
        let backend = ValidationBackend::new();
        let ctx = StepContext {
            step_name: "check-quota".to_string(),
            config: HashMap::new(),
            env: HashMap::new(),
        };
        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
