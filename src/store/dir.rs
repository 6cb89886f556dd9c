use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::DocumentStore;

/// Stores each document as `<root>/<database>/<collection>/<id>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl AsRef<Path>, database: &str) -> Self {
        Self {
            root: root.as_ref().join(database),
        }
    }

    pub fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root.join(collection).join(format!("{id}.json"))
    }
}

#[async_trait::async_trait]
impl DocumentStore for DirStore {
    async fn upsert(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        if id.is_empty() || id.contains(['/', '\\', '.']) {
            anyhow::bail!("refusing to store document with id '{id}'");
        }

        let dir = self.root.join(collection);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = self.document_path(collection, id);
        let tmp = dir.join(format!(".{id}.json.tmp"));
        let body = serde_json::to_vec(document)?;

        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to move document into {}", path.display()))?;

        debug!(path = %path.display(), "Document written");
        Ok(())
    }
}
