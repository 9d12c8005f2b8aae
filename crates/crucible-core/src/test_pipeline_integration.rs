//! End-to-end pipeline tests against a scripted model and a mock sandbox.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::config::PipelineConfig;
use crate::core_types::UserProfile;
use crate::errors::CodeToolError;
use crate::llm::{CompletionModel, CompletionRequest, HttpCompletionClient, ResponseFormat};
use crate::pipeline::{CodeRunPipeline, PipelinePhase, ProgressEvent, ProgressListener};
use crate::store::{FileObject, FileStore, InMemoryFileStore};
use crate::synthesis::SynthesisRequest;
use crate::test_utils::{mock_sandbox_server::ScriptedResponse, MockSandboxServer};

struct QueuedModel {
    replies: Mutex<VecDeque<Result<String, CodeToolError>>>,
}

impl QueuedModel {
    fn new(replies: Vec<Result<String, CodeToolError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from(replies)),
        })
    }
}

#[async_trait]
impl CompletionModel for QueuedModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CodeToolError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CodeToolError::Model("queue exhausted".to_string())))
    }
}

struct RecordingListener {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn phases(&self) -> Vec<PipelinePhase> {
        self.events.lock().unwrap().iter().map(|e| e.phase).collect()
    }
}

impl ProgressListener for RecordingListener {
    fn on_phase(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

async fn pipeline_with(
    model: Arc<dyn CompletionModel>,
    store: Arc<dyn FileStore>,
    sandbox_responses: Vec<ScriptedResponse>,
) -> (CodeRunPipeline, MockSandboxServer) {
    let server = MockSandboxServer::start(sandbox_responses).await;
    let config = PipelineConfig::default().with_sandbox_endpoint(server.address());
    (CodeRunPipeline::new(model, store, config), server)
}

#[tokio::test]
async fn test_end_to_end_completed_mapping() {
    let _ = env_logger::builder().is_test(true).try_init();

    let model = QueuedModel::new(vec![Ok(
        r#"{"code": "print(1+1)", "input_files": [], "input_links": []}"#.to_string(),
    )]);
    let store = Arc::new(InMemoryFileStore::new());
    let (pipeline, server) =
        pipeline_with(model, store, vec![Ok(json!({"success": true, "std_out": "2\n"}))]).await;

    let outcome = pipeline
        .run(SynthesisRequest::new("add two numbers", UserProfile::new("u1")))
        .await
        .unwrap();

    let expected = json!({
        "add two numbers": {
            "code": "print(1+1)",
            "results": {"success": true, "std_out": "2\n", "code": "print(1+1)"}
        }
    });
    assert_eq!(serde_json::to_value(&outcome).unwrap(), expected);
    server.shutdown().await;
}

#[tokio::test]
async fn test_end_to_end_sandbox_error_status_completes() {
    let model = QueuedModel::new(vec![Ok(r#"{"code": "print(1+1)"}"#.to_string())]);
    let store = Arc::new(InMemoryFileStore::new());
    let (pipeline, server) = pipeline_with(model, store, vec![Err(500)]).await;

    let outcome = pipeline
        .run(SynthesisRequest::new("add two numbers", UserProfile::new("u1")))
        .await
        .unwrap();

    let result = &outcome["add two numbers"].results;
    assert!(!result.success);
    assert_eq!(
        result.std_err.as_deref(),
        Some("Failed to execute code with 500")
    );
    assert_eq!(result.code, "print(1+1)");
    server.shutdown().await;
}

#[tokio::test]
async fn test_generation_failure_skips_execution() {
    let model = QueuedModel::new(vec![Ok(r#"{"input_files": []}"#.to_string())]);
    let store = Arc::new(InMemoryFileStore::new());
    let (pipeline, server) = pipeline_with(model, store, vec![]).await;
    let listener = RecordingListener::new();

    let mut pipeline = pipeline;
    pipeline.add_progress_listener(listener.clone());

    let err = pipeline
        .run(SynthesisRequest::new("add two numbers", UserProfile::new("u1")))
        .await
        .unwrap_err();

    match err {
        CodeToolError::Generation { query, .. } => assert_eq!(query, "add two numbers"),
        other => panic!("expected generation failure, got {other:?}"),
    }
    // No execution attempt was made.
    assert!(server.get_requests().is_empty());
    assert_eq!(
        listener.phases(),
        vec![PipelinePhase::Generating, PipelinePhase::Failed]
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_progress_events_arrive_in_order() {
    let model = QueuedModel::new(vec![Ok(r#"{"code": "print(1)"}"#.to_string())]);
    let store = Arc::new(InMemoryFileStore::new());
    let (mut pipeline, server) =
        pipeline_with(model, store, vec![Ok(json!({"success": true}))]).await;
    let listener = RecordingListener::new();
    pipeline.add_progress_listener(listener.clone());

    pipeline
        .run(SynthesisRequest::new("q", UserProfile::new("u1")))
        .await
        .unwrap();

    assert_eq!(
        listener.phases(),
        vec![
            PipelinePhase::Generating,
            PipelinePhase::Resolving,
            PipelinePhase::Executing,
            PipelinePhase::Completed,
        ]
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_requested_files_are_attached_to_execution() {
    let model = QueuedModel::new(vec![Ok(
        r#"{"code": "print(open('notes.txt').read())", "input_files": ["notes.txt", "missing.csv"]}"#
            .to_string(),
    )]);
    let store = Arc::new(InMemoryFileStore::new());
    store
        .insert("u1", FileObject::new("notes.txt", "hello"))
        .await;
    let (pipeline, server) =
        pipeline_with(model, store, vec![Ok(json!({"success": true}))]).await;

    pipeline
        .run(SynthesisRequest::new("read my notes", UserProfile::new("u1")))
        .await
        .unwrap();

    let requests = server.get_requests();
    assert_eq!(requests.len(), 1);
    let files = requests[0]["files"].as_array().unwrap();
    // The unmatched name contributes no artifact and raises no error.
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "notes.txt");
    assert_eq!(files[0]["b64_data"], "aGVsbG8=");
    server.shutdown().await;
}

#[tokio::test]
async fn test_sandbox_transport_failure_is_a_pipeline_failure() {
    let model = QueuedModel::new(vec![Ok(r#"{"code": "print(1)"}"#.to_string())]);
    let store = Arc::new(InMemoryFileStore::new());

    // Closed port: bind then drop a listener.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = PipelineConfig {
        sandbox_endpoint: format!("http://{}", addr),
        retry_transient: false,
        ..PipelineConfig::default()
    };
    let pipeline = CodeRunPipeline::new(model, store, config);

    let err = pipeline
        .run(SynthesisRequest::new("q", UserProfile::new("u1")))
        .await
        .unwrap_err();
    assert!(matches!(err, CodeToolError::Execution { .. }));
}

#[tokio::test]
async fn test_http_completion_client_round_trip() {
    use axum::{routing::post, Json, Router};

    async fn complete_handler(Json(payload): Json<serde_json::Value>) -> Json<serde_json::Value> {
        assert_eq!(payload["response_format"], "json_object");
        Json(json!({"content": "{\"code\": \"print(2)\"}"}))
    }

    let app = Router::new().route("/v1/complete", post(complete_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let client = HttpCompletionClient::new(format!("http://{}", addr));
    let reply = client
        .complete(CompletionRequest {
            prompt: "write code".to_string(),
            images: Vec::new(),
            response_format: ResponseFormat::JsonObject,
            user_id: Some("u1".to_string()),
            trace: Default::default(),
        })
        .await
        .unwrap();
    assert_eq!(reply, "{\"code\": \"print(2)\"}");
}
