// `http` step backend: issues the configured HTTP request via reqwest.
// Timeouts and 5xx responses are transient (Retryable); 4xx is a client
// error in the request itself and does not get retried (Permanent).

use crate::backend::{BackendError, StepBackend, StepContext, StepOutcome};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepBackend for HttpBackend {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, BackendError> {
        let url = ctx
            .config
            .get("endpoint")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::Permanent("config.endpoint is required".to_string()))?;

        let method = ctx
            .config
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("POST")
            .to_uppercase();
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| BackendError::Permanent(format!("invalid HTTP method: {method}")))?;

        let timeout_secs = ctx
            .config
            .get("timeout_seconds")
            .and_then(|v| v.as_u64())
            .unwrap_or(30);

        let mut request = self
            .client
            .request(method, url)
            .timeout(Duration::from_secs(timeout_secs));

        if let Some(body) = ctx.config.get("body") {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                BackendError::Retryable(format!("request failed: {e}"))
            } else {
                BackendError::Permanent(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| BackendError::Retryable(format!("failed to read response body: {e}")))?;

        if status.is_server_error() {
            return Err(BackendError::Retryable(format!(
                "server error {status}: {body_text}"
            )));
        }
        if status.is_client_error() {
            return Err(BackendError::Permanent(format!(
                "client error {status}: {body_text}"
            )));
        }

        let mut outcome = StepOutcome::default();
        outcome
            .outputs
            .insert("status_code".to_string(), json!(status.as_u16()));
        outcome.outputs.insert("body".to_string(), json!(body_text));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_request_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/provision"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new();
        let mut config = HashMap::new();
        config.insert(
            "endpoint".to_string(),
            json!(format!("{}/provision", server.uri())),
        );
        let ctx = StepContext {
            step_name: "call-api".to_string(),
            config,
            env: HashMap::new(),
        };

        let outcome = backend.run(&ctx).await.unwrap();
        assert_eq!(outcome.outputs["status_code"], json!(200));
        assert_eq!(outcome.outputs["body"], json!("ok"));
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/provision"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = HttpBackend::new();
        let mut config = HashMap::new();
        config.insert(
            "endpoint".to_string(),
            json!(format!("{}/provision", server.uri())),
        );
        let ctx = StepContext {
            step_name: "call-api".to_string(),
            config,
            env: HashMap::new(),
        };

        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Retryable(_)));
    }

    #[tokio::test]
    async fn client_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/provision"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let backend = HttpBackend::new();
        let mut config = HashMap::new();
        config.insert(
            "endpoint".to_string(),
            json!(format!("{}/provision", server.uri())),
        );
        let ctx = StepContext {
            step_name: "call-api".to_string(),
            config,
            env: HashMap::new(),
        };

        let err = backend.run(&ctx).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
