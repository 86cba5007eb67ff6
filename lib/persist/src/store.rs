//! Document stores.

use crate::error::PersistError;
use async_trait::async_trait;
use flowloom_core::DocumentId;
use flowloom_graph::DocumentSnapshot;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Async persistence boundary.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists a snapshot. Idempotent per revision: saving a revision
    /// already at rest is a no-op.
    async fn save(&self, document: &DocumentSnapshot) -> Result<(), PersistError>;

    /// Loads a snapshot.
    async fn load(&self, id: DocumentId) -> Result<DocumentSnapshot, PersistError>;
}

/// JSON files on disk, one per document.
///
/// Writes go to a sibling temp file first and are renamed into place, so
/// a crash mid-write never leaves a half-written document behind.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at a directory. The directory is created on
    /// first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: DocumentId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn read_revision(&self, path: &Path) -> Option<u64> {
        let raw = tokio::fs::read_to_string(path).await.ok()?;
        let existing: DocumentSnapshot = serde_json::from_str(&raw).ok()?;
        Some(existing.revision)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn save(&self, document: &DocumentSnapshot) -> Result<(), PersistError> {
        let path = self.path_for(document.id);
        if self.read_revision(&path).await == Some(document.revision) {
            tracing::debug!(id = %document.id, revision = document.revision, "save skipped, revision at rest");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_string_pretty(document).map_err(|e| PersistError::Corrupt {
            id: document.id,
            detail: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::info!(id = %document.id, revision = document.revision, "document saved");
        Ok(())
    }

    async fn load(&self, id: DocumentId) -> Result<DocumentSnapshot, PersistError> {
        let path = self.path_for(id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound { id });
            }
            Err(err) => return Err(PersistError::Io(err)),
        };
        serde_json::from_str(&raw).map_err(|e| PersistError::Corrupt {
            id,
            detail: e.to_string(),
        })
    }
}

/// In-memory store for tests and for the relay's room bootstrap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentId, DocumentSnapshot>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(&self, document: &DocumentSnapshot) -> Result<(), PersistError> {
        self.documents
            .lock()
            .expect("store lock")
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn load(&self, id: DocumentId) -> Result<DocumentSnapshot, PersistError> {
        self.documents
            .lock()
            .expect("store lock")
            .get(&id)
            .cloned()
            .ok_or(PersistError::NotFound { id })
    }
}
