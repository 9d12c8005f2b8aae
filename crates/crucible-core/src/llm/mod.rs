//! Language model abstractions and the HTTP completion client.
//!
//! Defines the completion-model trait the synthesizer talks to, together
//! with an implementation backed by a remote HTTP completion endpoint.
//! Includes utilities for cleaning model output before parsing.

use crate::core_types::TraceMetadata;
use crate::errors::CodeToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub trace: TraceMetadata,
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Run one completion and return the raw reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CodeToolError>;
}

use reqwest::Client;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpCompletionClient {
    pub endpoint_url: String,
    client: Client,
    retry_transient: bool,
}

impl HttpCompletionClient {
    pub fn new(endpoint_url: String) -> Self {
        Self::with_timeout(endpoint_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint_url: String, timeout: Duration) -> Self {
        Self {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            retry_transient: true,
        }
    }

    pub fn with_retry_transient(mut self, retry: bool) -> Self {
        self.retry_transient = retry;
        self
    }
}

#[async_trait]
impl CompletionModel for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CodeToolError> {
        #[derive(Deserialize)]
        struct CompletionReply {
            content: String,
        }

        let request_url = format!("{}/v1/complete", self.endpoint_url);
        log::debug!(
            "HttpCompletionClient sending request to {} (trace {})",
            request_url,
            request.trace.trace_id
        );

        let mut attempt = self.client.post(&request_url).json(&request).send().await;
        if self.retry_transient {
            if let Err(err) = &attempt {
                if err.is_connect() || err.is_timeout() {
                    log::warn!(
                        "Transient error calling completion endpoint, retrying once: {}",
                        err
                    );
                    attempt = self.client.post(&request_url).json(&request).send().await;
                }
            }
        }

        let response = attempt.map_err(|e| {
            let err_msg = format!("HTTP request to completion endpoint failed: {}", e);
            log::error!("{}", err_msg);
            CodeToolError::Model(err_msg)
        })?;

        if response.status().is_success() {
            let reply: CompletionReply = response.json().await.map_err(|e| {
                let err_msg = format!("Failed to parse completion response JSON: {}", e);
                log::error!("{}", err_msg);
                CodeToolError::Parsing(err_msg)
            })?;
            log::debug!(
                "HttpCompletionClient received {} bytes of content",
                reply.content.len()
            );
            Ok(reply.content)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error while reading error response body".to_string());
            let err_msg = format!(
                "Completion request failed with status {}: {}",
                status, error_text
            );
            log::error!("{}", err_msg);
            Err(CodeToolError::Model(err_msg))
        }
    }
}
