//! Input resolution: requested filenames to transport-ready artifacts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;

use crate::core_types::{FileMatch, InputArtifact};
use crate::errors::CodeToolError;
use crate::store::FileStore;

/// Artifacts ready for transport plus the per-name lookup outcome. A name
/// with no stored match contributes zero artifacts and `found: false`.
#[derive(Debug, Clone, Default)]
pub struct ResolvedInputs {
    pub artifacts: Vec<InputArtifact>,
    pub matches: Vec<FileMatch>,
}

pub struct InputResolver {
    store: Arc<dyn FileStore>,
}

impl InputResolver {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Best-effort attach: every stored entry matching a requested name
    /// becomes one artifact, base64-encoded, with its name reduced to the
    /// basename. Misses are reported and logged, never raised.
    pub async fn resolve(
        &self,
        user_id: &str,
        filenames: &[String],
    ) -> Result<ResolvedInputs, CodeToolError> {
        let mut resolved = ResolvedInputs::default();
        for name in filenames {
            let entries = self.store.get_file_objects_by_name(user_id, name).await?;
            if entries.is_empty() {
                log::warn!("No stored file matches '{}' for user {}", name, user_id);
            }
            resolved.matches.push(FileMatch {
                requested: name.clone(),
                found: !entries.is_empty(),
            });
            for entry in entries {
                resolved.artifacts.push(InputArtifact {
                    filename: basename(&entry.file_name),
                    b64_data: STANDARD.encode(entry.raw_text.as_bytes()),
                });
            }
        }
        Ok(resolved)
    }
}

fn basename(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
