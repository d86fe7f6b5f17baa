//! Embedding backend contract and the on-disk cache in front of it.
//!
//! The embedding backend itself is an external collaborator (local model,
//! remote API); this module only defines the trait the retrieval index
//! calls through, plus a cache keyed by a stable hash of chunk text.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;
}

/// Stable content hash used as the cache key: a `sha2`-based digest survives
/// process restarts and toolchain upgrades, unlike `DefaultHasher`, whose
/// output is explicitly not guaranteed stable across Rust releases.
fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Vec<f32>>>,
    persist_path: Option<PathBuf>,
    flush_every: usize,
    since_flush: AtomicUsize,
    request_timeout: Duration,
}

impl EmbeddingCache {
    pub fn new(persist_path: Option<PathBuf>, flush_every: usize, request_timeout: Duration) -> Self {
        let entries = persist_path
            .as_ref()
            .filter(|p| p.exists())
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|raw| serde_json::from_str::<HashMap<String, Vec<f32>>>(&raw).ok())
            .unwrap_or_default();
        Self {
            entries: RwLock::new(entries),
            persist_path,
            flush_every: flush_every.max(1),
            since_flush: AtomicUsize::new(0),
            request_timeout,
        }
    }

    /// Returns the cached embedding for `text`, computing and inserting it
    /// via `backend` on a cache miss. Flushes to disk every `flush_every`
    /// insertions.
    pub async fn get_or_compute(
        &self,
        text: &str,
        backend: &dyn EmbeddingBackend,
    ) -> CoreResult<Vec<f32>> {
        let key = hash_text(text);
        if let Some(vector) = self.entries.read().unwrap().get(&key).cloned() {
            return Ok(vector);
        }

        let vector = tokio::time::timeout(self.request_timeout, backend.embed(text))
            .await
            .map_err(|_| CoreError::transient("embedding backend timed out"))??;

        self.entries.write().unwrap().insert(key, vector.clone());
        let count = self.since_flush.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.flush_every {
            self.since_flush.store(0, Ordering::SeqCst);
            self.flush()?;
        }
        Ok(vector)
    }

    pub fn flush(&self) -> CoreResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let entries = self.entries.read().unwrap();
        crate::retrieval::vector_store::write_json_atomic(path, &*entries)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
