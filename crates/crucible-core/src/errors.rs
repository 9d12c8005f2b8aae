//! Error types for failure handling across the pipeline
//!
//! A single error hierarchy covering every failure mode in the code
//! execution pipeline. Only two kinds cross the pipeline boundary —
//! generation failures and execution failures, both carrying the original
//! query and the underlying cause — while the remaining variants classify
//! failures inside individual stages before the orchestrator wraps them.
//! Sandbox-reported program failures are not errors at all; they surface as
//! completed results with `success = false`.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CodeToolError {
    #[error("Failed to generate code for '{query}': {cause}")]
    Generation { query: String, cause: String },
    #[error("Failed to run code for '{query}': {cause}")]
    Execution { query: String, cause: String },
    #[error("Model interaction failed: {0}")]
    Model(String),
    #[error("Sandbox request failed: {0}")]
    Sandbox(String),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("File store error: {0}")]
    Store(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CodeToolError {
    fn from(err: reqwest::Error) -> Self {
        CodeToolError::Model(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_errors_embed_query_and_cause() {
        let err = CodeToolError::Generation {
            query: "add two numbers".to_string(),
            cause: "model reply is not valid JSON".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("add two numbers"));
        assert!(message.contains("not valid JSON"));
    }
}
