//! Sandbox client: remote execution of generated programs.
//!
//! Sends one program plus its input artifacts to the isolated execution
//! service and normalizes the response. The code text is cleaned of
//! formatting fences before transmission, and that cleaned form is what the
//! returned result always reports as `code` — never whatever the remote
//! service echoes back.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::core_types::{ExecutionResult, InputArtifact};
use crate::errors::CodeToolError;
use crate::llm::utils::strip_code_fences;

pub struct SandboxClient {
    client: Client,
    endpoint: String,
    retry_transient: bool,
}

impl SandboxClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: endpoint.into(),
            retry_transient: true,
        }
    }

    pub fn with_retry_transient(mut self, retry: bool) -> Self {
        self.retry_transient = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute `code` remotely. A non-success HTTP status is a normal
    /// outcome reported as `success = false`; only transport-level failures
    /// are errors.
    pub async fn execute(
        &self,
        code: &str,
        files: &[InputArtifact],
    ) -> Result<ExecutionResult, CodeToolError> {
        #[derive(Serialize)]
        struct ExecutePayload<'a> {
            code: &'a str,
            files: &'a [InputArtifact],
        }

        let cleaned_code = strip_code_fences(code);
        let payload = ExecutePayload {
            code: &cleaned_code,
            files,
        };

        log::debug!(
            "Posting {} bytes of code and {} file(s) to sandbox at {}",
            cleaned_code.len(),
            files.len(),
            self.endpoint
        );

        let mut attempt = self.client.post(&self.endpoint).json(&payload).send().await;
        if self.retry_transient {
            if let Err(err) = &attempt {
                if err.is_connect() || err.is_timeout() {
                    log::warn!("Transient error calling sandbox, retrying once: {}", err);
                    attempt = self.client.post(&self.endpoint).json(&payload).send().await;
                }
            }
        }

        let response = attempt.map_err(|e| {
            let err_msg = format!("HTTP request to sandbox failed: {}", e);
            log::error!("{}", err_msg);
            CodeToolError::Sandbox(err_msg)
        })?;

        if response.status().is_success() {
            let mut result: ExecutionResult = response.json().await.map_err(|e| {
                CodeToolError::Parsing(format!("Failed to parse sandbox response JSON: {}", e))
            })?;
            // The caller must always see what actually executed.
            result.code = cleaned_code;
            Ok(result)
        } else {
            let status = response.status().as_u16();
            log::error!("Sandbox returned status {}", status);
            Ok(ExecutionResult {
                code: cleaned_code,
                success: false,
                std_out: None,
                std_err: Some(format!("Failed to execute code with {}", status)),
                extra: Default::default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockSandboxServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_success_overwrites_echoed_code() {
        let server = MockSandboxServer::start(vec![Ok(json!({
            "success": true,
            "std_out": "2\n",
            "code": "something else entirely"
        }))])
        .await;

        let client = SandboxClient::new(server.address());
        let result = client.execute("print(1+1)", &[]).await.unwrap();

        assert!(result.success);
        assert_eq!(result.code, "print(1+1)");
        assert_eq!(result.std_out.as_deref(), Some("2\n"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_code_is_normalized_before_transmission() {
        let server =
            MockSandboxServer::start(vec![Ok(json!({"success": true}))]).await;

        let client = SandboxClient::new(server.address());
        let result = client
            .execute("```python\nprint(1+1)\n```", &[])
            .await
            .unwrap();

        assert_eq!(result.code, "print(1+1)");
        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["code"], "print(1+1)");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_artifacts_are_sent_in_payload() {
        let server =
            MockSandboxServer::start(vec![Ok(json!({"success": true}))]).await;

        let client = SandboxClient::new(server.address());
        let files = vec![InputArtifact {
            filename: "notes.txt".to_string(),
            b64_data: "aGVsbG8=".to_string(),
        }];
        client.execute("print(1)", &files).await.unwrap();

        let requests = server.get_requests();
        assert_eq!(requests[0]["files"][0]["filename"], "notes.txt");
        assert_eq!(requests[0]["files"][0]["b64_data"], "aGVsbG8=");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_completed_failure() {
        let server = MockSandboxServer::start(vec![Err(500)]).await;

        let client = SandboxClient::new(server.address());
        let result = client.execute("print(1+1)", &[]).await.unwrap();

        assert!(!result.success);
        assert_eq!(
            result.std_err.as_deref(),
            Some("Failed to execute code with 500")
        );
        assert_eq!(result.code, "print(1+1)");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        // Bind then drop a listener so the port is closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = SandboxClient::new(format!("http://{}", addr)).with_retry_transient(false);
        let result = client.execute("print(1)", &[]).await;
        assert!(matches!(result, Err(CodeToolError::Sandbox(_))));
    }
}
