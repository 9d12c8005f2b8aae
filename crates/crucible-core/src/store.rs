//! File-store seam: lookup-by-name over a user's stored files.
//!
//! The pipeline only ever reads from the store. The trait is the narrow
//! interface a durable backend implements; [`InMemoryFileStore`] is the
//! reference implementation used by embedders and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::CodeToolError;

/// A stored file entry: a name (possibly carrying path components) and raw
/// text content.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileObject {
    pub file_name: String,
    pub raw_text: String,
}

impl FileObject {
    pub fn new(file_name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            raw_text: raw_text.into(),
        }
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// All entries owned by `user_id` whose name matches `file_name`
    /// exactly. An unknown name is an empty result, not an error.
    async fn get_file_objects_by_name(
        &self,
        user_id: &str,
        file_name: &str,
    ) -> Result<Vec<FileObject>, CodeToolError>;
}

#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Vec<FileObject>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: &str, file: FileObject) {
        self.files
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(file);
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn get_file_objects_by_name(
        &self,
        user_id: &str,
        file_name: &str,
    ) -> Result<Vec<FileObject>, CodeToolError> {
        let files = self.files.read().await;
        Ok(files
            .get(user_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.file_name == file_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
