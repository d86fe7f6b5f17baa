//! Persistent vector collection: cosine-distance lookup over fixed-width
//! embeddings, one JSON file per collection generation.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: serde_json::Value,
}

pub struct VectorStore {
    dimensions: usize,
    records: RwLock<HashMap<Uuid, VectorRecord>>,
    persist_path: Option<PathBuf>,
}

impl VectorStore {
    pub fn new(dimensions: usize, persist_path: Option<PathBuf>) -> Self {
        Self {
            dimensions,
            records: RwLock::new(HashMap::new()),
            persist_path,
        }
    }

    pub fn load(dimensions: usize, persist_path: PathBuf) -> CoreResult<Self> {
        let records = if persist_path.exists() {
            let raw = std::fs::read_to_string(&persist_path)
                .map_err(|e| CoreError::fatal(format!("reading vector store: {e}")))?;
            let list: Vec<VectorRecord> = serde_json::from_str(&raw)
                .map_err(|e| CoreError::fatal(format!("parsing vector store: {e}")))?;
            list.into_iter().map(|r| (r.chunk_id, r)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            dimensions,
            records: RwLock::new(records),
            persist_path: Some(persist_path),
        })
    }

    pub fn add(&self, chunk_id: Uuid, document_id: Uuid, vector: Vec<f32>, content: String, metadata: serde_json::Value) -> CoreResult<()> {
        if vector.len() != self.dimensions {
            return Err(CoreError::validation(format!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.records.write().unwrap().insert(
            chunk_id,
            VectorRecord {
                chunk_id,
                document_id,
                vector,
                content,
                metadata,
            },
        );
        self.persist()
    }

    pub fn remove(&self, chunk_id: Uuid) -> CoreResult<()> {
        self.records.write().unwrap().remove(&chunk_id);
        self.persist()
    }

    pub fn remove_document(&self, document_id: Uuid) -> CoreResult<()> {
        self.records
            .write()
            .unwrap()
            .retain(|_, r| r.document_id != document_id);
        self.persist()
    }

    pub fn rebuild(&self, records: Vec<VectorRecord>) -> CoreResult<()> {
        let mut map = self.records.write().unwrap();
        map.clear();
        for record in records {
            map.insert(record.chunk_id, record);
        }
        drop(map);
        self.persist()
    }

    pub fn all(&self) -> Vec<VectorRecord> {
        self.records.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `top_k` `(chunk_id, similarity)` pairs, sorted
    /// descending by similarity, among chunks passing `filter`.
    pub fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: impl Fn(&VectorRecord) -> bool,
    ) -> Vec<(VectorRecord, f32)> {
        let records = self.records.read().unwrap();
        let mut scored: Vec<(VectorRecord, f32)> = records
            .values()
            .filter(|r| filter(r))
            .map(|r| {
                let distance = cosine_distance(vector, &r.vector);
                let similarity = (1.0 - distance).clamp(0.0, 1.0);
                (r.clone(), similarity)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }

    fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        write_json_atomic(path, &self.all())
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (1.0 - similarity).clamp(0.0, 2.0)
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::fatal(format!("creating {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::fatal(format!("serializing {}: {e}", path.display())))?;
    std::fs::write(&tmp, json)
        .map_err(|e| CoreError::fatal(format!("writing {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| CoreError::fatal(format!("renaming into {}: {e}", path.display())))?;
    Ok(())
}
