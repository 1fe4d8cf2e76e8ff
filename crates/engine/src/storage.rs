//! Blob storage for generated documents.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{EngineError, ResultEngine};

/// Stores a document and returns a locator for it (path or URL).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> ResultEngine<String>;
}

/// Keeps only `[A-Za-z0-9._-]` of the last path component.
fn safe_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes files under a root directory, prefixed with a millisecond
/// timestamp so repeated names never overwrite each other.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> ResultEngine<String> {
        let io_err =
            |err: std::io::Error| EngineError::Collaborator(format!("blob store: {err}"));

        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let file_name = format!("{}-{}", Utc::now().timestamp_millis(), safe_name(name));
        let target = self.root.join(file_name);
        tokio::fs::write(&target, bytes).await.map_err(io_err)?;
        Ok(target.display().to_string())
    }
}

/// In-memory store, for tests and ephemeral deployments.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn get(&self, locator: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> ResultEngine<String> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        let locator = format!("memory://{}/{}", blobs.len() + 1, safe_name(name));
        blobs.insert(locator.clone(), bytes);
        Ok(locator)
    }
}
