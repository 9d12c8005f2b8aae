//! Core type definitions for the code execution pipeline
//!
//! This module defines the data structures exchanged between the pipeline
//! stages: the conversational context fed to code synthesis, the generated
//! program descriptor, the input artifacts attached to an execution request,
//! and the normalized execution result. These types serve as the contract
//! between the synthesizer, the resolver, and the sandbox client, ensuring
//! every stage consumes exactly what its predecessor produced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Structured location hint for the synthesis prompt.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LocationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl fmt::Display for LocationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.city, &self.region, &self.country]
            .iter()
            .filter_map(|part| part.as_deref())
            .collect();
        if parts.is_empty() {
            write!(f, "Unknown")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Identity of the requesting user, for the model call and file lookups.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Opaque correlation data passed through to the model call unchanged.
/// The pipeline never interprets it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TraceMetadata {
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl TraceMetadata {
    pub fn new() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

impl Default for TraceMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Program descriptor produced by code synthesis.
///
/// Invariant: `code` is non-empty and trimmed; synthesis fails otherwise.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeneratedProgram {
    pub code: String,
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub input_links: Vec<String>,
}

/// A named payload attached to an execution request, sourced read-only from
/// the user's file store. `filename` carries no path components.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InputArtifact {
    pub filename: String,
    pub b64_data: String,
}

/// Per-requested-name resolution outcome. A name with no stored match is
/// reported, not raised.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileMatch {
    pub requested: String,
    pub found: bool,
}

/// Normalized outcome of a sandbox run.
///
/// Invariant: `code` always equals the exact normalized code that was sent;
/// whatever the sandbox echoes back is overwritten. Sandbox-defined fields
/// beyond the known ones are preserved in `extra`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExecutionResult {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_err: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
