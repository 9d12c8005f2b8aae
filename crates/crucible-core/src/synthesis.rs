//! Code synthesis: natural-language query to executable program.
//!
//! Builds a single prompt from the query and its surrounding context, asks
//! the completion model for a JSON-object reply, and validates the reply
//! into a [`GeneratedProgram`]. Purely functional given its inputs; the only
//! side effect is the model call itself.

use std::sync::Arc;

use serde_json::Value;

use crate::core_types::{GeneratedProgram, LocationData, Message, TraceMetadata, UserProfile};
use crate::errors::CodeToolError;
use crate::llm::utils::clean_json;
use crate::llm::{CompletionModel, CompletionRequest, ResponseFormat};
use crate::prompts;

/// Everything one synthesis call needs. Images and trace metadata are passed
/// through to the model unchanged.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub query: String,
    pub history: Vec<Message>,
    pub context: String,
    pub location: Option<LocationData>,
    pub user: UserProfile,
    pub images: Vec<String>,
    pub persona: Option<String>,
    pub trace: TraceMetadata,
}

impl SynthesisRequest {
    pub fn new(query: impl Into<String>, user: UserProfile) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
            context: String::new(),
            location: None,
            user,
            images: Vec::new(),
            persona: None,
            trace: TraceMetadata::new(),
        }
    }
}

pub struct CodeSynthesizer {
    model: Arc<dyn CompletionModel>,
}

impl CodeSynthesizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<GeneratedProgram, CodeToolError> {
        let prompt = self.build_prompt(request);
        log::debug!(
            "Synthesizing code for '{}' ({} prompt bytes)",
            request.query,
            prompt.len()
        );

        let reply = self
            .model
            .complete(CompletionRequest {
                prompt,
                images: request.images.clone(),
                response_format: ResponseFormat::JsonObject,
                user_id: Some(request.user.id.clone()),
                trace: request.trace.clone(),
            })
            .await?;

        parse_reply(&reply)
    }

    fn build_prompt(&self, request: &SynthesisRequest) -> String {
        let location = request
            .location
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let username = request
            .user
            .display_name
            .as_deref()
            .map(prompts::user_name_fragment)
            .unwrap_or_default();
        let personality = request
            .persona
            .as_deref()
            .map(prompts::personality_fragment)
            .unwrap_or_default();
        let chat_history = prompts::render_history(&request.history);
        let current_date = chrono::Utc::now().format("%Y-%m-%d").to_string();

        prompts::code_generation_prompt(&prompts::CodePromptArgs {
            current_date: &current_date,
            query: &request.query,
            chat_history: &chat_history,
            context: &request.context,
            location: &location,
            username: &username,
            personality: &personality,
        })
    }
}

/// Validate a model reply into a program descriptor. The reply must be a
/// JSON object with a non-empty string `code`; `input_files` and
/// `input_links` default to empty.
fn parse_reply(reply: &str) -> Result<GeneratedProgram, CodeToolError> {
    let cleaned = clean_json(reply);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| CodeToolError::Parsing(format!("Model reply is not valid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| CodeToolError::Parsing("Model reply is not a JSON object".to_string()))?;

    let code = object
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CodeToolError::Parsing("Model reply has no string 'code' field".to_string())
        })?
        .trim();
    if code.is_empty() {
        return Err(CodeToolError::Parsing(
            "Model reply contains empty code".to_string(),
        ));
    }

    Ok(GeneratedProgram {
        code: code.to_string(),
        input_files: string_list(object.get("input_files")),
        input_links: string_list(object.get("input_links")),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl RecordingModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionModel for RecordingModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, CodeToolError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_parse_reply_valid() {
        let program = parse_reply(
            r#"{"code": "  print(1+1)  ", "input_files": ["a.txt"], "input_links": []}"#,
        )
        .unwrap();
        assert_eq!(program.code, "print(1+1)");
        assert_eq!(program.input_files, vec!["a.txt".to_string()]);
        assert!(program.input_links.is_empty());
    }

    #[test]
    fn test_parse_reply_defaults_missing_lists() {
        let program = parse_reply(r#"{"code": "print(1)"}"#).unwrap();
        assert!(program.input_files.is_empty());
        assert!(program.input_links.is_empty());
    }

    #[test]
    fn test_parse_reply_unwraps_fenced_json() {
        let program = parse_reply("```json\n{\"code\": \"print(1)\"}\n```").unwrap();
        assert_eq!(program.code, "print(1)");
    }

    #[test]
    fn test_parse_reply_rejects_missing_code() {
        assert!(matches!(
            parse_reply(r#"{"input_files": []}"#),
            Err(CodeToolError::Parsing(_))
        ));
    }

    #[test]
    fn test_parse_reply_rejects_non_string_code() {
        assert!(matches!(
            parse_reply(r#"{"code": 42}"#),
            Err(CodeToolError::Parsing(_))
        ));
    }

    #[test]
    fn test_parse_reply_rejects_whitespace_code() {
        assert!(matches!(
            parse_reply(r#"{"code": "   "}"#),
            Err(CodeToolError::Parsing(_))
        ));
    }

    #[test]
    fn test_parse_reply_rejects_invalid_json() {
        assert!(matches!(
            parse_reply("not json at all"),
            Err(CodeToolError::Parsing(_))
        ));
    }

    #[test]
    fn test_parse_reply_rejects_non_object() {
        assert!(matches!(
            parse_reply(r#"["print(1)"]"#),
            Err(CodeToolError::Parsing(_))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_requests_json_object_reply() {
        let model = RecordingModel::new(r#"{"code": "print(1)"}"#);
        let synthesizer = CodeSynthesizer::new(model.clone());
        let request = SynthesisRequest::new("compute one", UserProfile::new("user-1"));

        let program = synthesizer.synthesize(&request).await.unwrap();
        assert_eq!(program.code, "print(1)");

        let recorded = model.requests.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].response_format, ResponseFormat::JsonObject);
        assert_eq!(recorded[0].user_id.as_deref(), Some("user-1"));
        assert!(recorded[0].prompt.contains("compute one"));
    }

    #[tokio::test]
    async fn test_synthesize_prompt_fragments() {
        let model = RecordingModel::new(r#"{"code": "print(1)"}"#);
        let synthesizer = CodeSynthesizer::new(model.clone());

        // No display name, no persona, no location.
        let bare = SynthesisRequest::new("q", UserProfile::new("u"));
        synthesizer.synthesize(&bare).await.unwrap();

        let mut full = SynthesisRequest::new(
            "q",
            UserProfile::new("u").with_display_name("Ada"),
        );
        full.persona = Some("terse and precise".to_string());
        full.location = Some(LocationData {
            city: Some("Lyon".to_string()),
            region: None,
            country: None,
        });
        synthesizer.synthesize(&full).await.unwrap();

        let recorded = model.requests.lock().unwrap();
        assert!(!recorded[0].prompt.contains("User's Name"));
        assert!(!recorded[0].prompt.contains("personality"));
        assert!(recorded[0].prompt.contains("Unknown"));
        assert!(recorded[1].prompt.contains("User's Name: Ada."));
        assert!(recorded[1].prompt.contains("terse and precise"));
        assert!(recorded[1].prompt.contains("Lyon"));
    }

    #[tokio::test]
    async fn test_synthesize_passes_images_through() {
        let model = RecordingModel::new(r#"{"code": "print(1)"}"#);
        let synthesizer = CodeSynthesizer::new(model.clone());
        let mut request = SynthesisRequest::new("q", UserProfile::new("u"));
        request.images = vec!["data:image/png;base64,AAAA".to_string()];

        synthesizer.synthesize(&request).await.unwrap();

        let recorded = model.requests.lock().unwrap();
        assert_eq!(recorded[0].images, request.images);
    }
}
