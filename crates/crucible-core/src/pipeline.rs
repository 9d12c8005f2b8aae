//! Pipeline orchestration: synthesis, resolution, execution.
//!
//! Sequences the three stages as one sequential async pipeline per
//! invocation, emits ordered phase events to registered listeners, and
//! unifies failure handling: everything that goes wrong surfaces as one of
//! two boundary errors carrying the original query and the underlying
//! cause. A program that runs and fails inside the sandbox is not an error;
//! it completes with `success = false` for the calling layer to interpret.
//!
//! Phases: Idle → Generating → Resolving → Executing → Completed | Failed.
//! No phase is re-entered, and a Failed transition is terminal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::core_types::ExecutionResult;
use crate::errors::CodeToolError;
use crate::llm::CompletionModel;
use crate::resolver::InputResolver;
use crate::sandbox::SandboxClient;
use crate::store::FileStore;
use crate::synthesis::{CodeSynthesizer, SynthesisRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Idle,
    Generating,
    Resolving,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: PipelinePhase,
    pub message: String,
}

/// Observer for phase transitions. Zero listeners means phases run silently
/// with no observable side effect besides the final result.
pub trait ProgressListener: Send + Sync {
    fn on_phase(&self, event: &ProgressEvent);
}

/// Terminal payload for one query: the code that ran and the normalized
/// sandbox outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub code: String,
    pub results: ExecutionResult,
}

pub struct CodeRunPipeline {
    synthesizer: CodeSynthesizer,
    resolver: InputResolver,
    sandbox: SandboxClient,
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl CodeRunPipeline {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        store: Arc<dyn FileStore>,
        config: PipelineConfig,
    ) -> Self {
        let sandbox = SandboxClient::with_timeout(
            config.sandbox_endpoint.clone(),
            config.request_timeout(),
        )
        .with_retry_transient(config.retry_transient);
        Self {
            synthesizer: CodeSynthesizer::new(model),
            resolver: InputResolver::new(store),
            sandbox,
            listeners: Vec::new(),
        }
    }

    pub fn add_progress_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    fn emit(&self, phase: PipelinePhase, message: impl Into<String>) {
        if self.listeners.is_empty() {
            return;
        }
        let event = ProgressEvent {
            phase,
            message: message.into(),
        };
        for listener in &self.listeners {
            listener.on_phase(&event);
        }
    }

    /// Run the full pipeline for one request. The result maps the original
    /// query to its outcome.
    pub async fn run(
        &self,
        request: SynthesisRequest,
    ) -> Result<HashMap<String, QueryResult>, CodeToolError> {
        let query = request.query.clone();

        self.emit(
            PipelinePhase::Generating,
            format!("Generating code for {}", query),
        );
        let started = Instant::now();
        let program = match self.synthesizer.synthesize(&request).await {
            Ok(program) => program,
            Err(e) => {
                self.emit(PipelinePhase::Failed, e.to_string());
                return Err(CodeToolError::Generation {
                    query,
                    cause: e.to_string(),
                });
            }
        };
        log::debug!("Generated program in {:?}", started.elapsed());

        self.emit(PipelinePhase::Resolving, "Attaching input files");
        let resolved = match self
            .resolver
            .resolve(&request.user.id, &program.input_files)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                self.emit(PipelinePhase::Failed, e.to_string());
                return Err(CodeToolError::Execution {
                    query,
                    cause: e.to_string(),
                });
            }
        };
        for file_match in &resolved.matches {
            if !file_match.found {
                log::warn!(
                    "Requested input file '{}' not found for '{}'",
                    file_match.requested,
                    query
                );
            }
        }

        self.emit(PipelinePhase::Executing, "Running code");
        let started = Instant::now();
        let result = match self
            .sandbox
            .execute(&program.code, &resolved.artifacts)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                self.emit(PipelinePhase::Failed, e.to_string());
                return Err(CodeToolError::Execution {
                    query,
                    cause: e.to_string(),
                });
            }
        };
        log::debug!("Executed program in {:?}", started.elapsed());
        log::info!(
            "Executed code for '{}': success={} stdout={:?} stderr={:?}",
            query,
            result.success,
            result.std_out,
            result.std_err
        );

        self.emit(PipelinePhase::Completed, "Completed");
        let mut outcome = HashMap::new();
        outcome.insert(
            query,
            QueryResult {
                code: result.code.clone(),
                results: result,
            },
        );
        Ok(outcome)
    }
}
