//! Hybrid retrieval index: document store + vector search + keyword
//! search, merged by caller-supplied weights.

pub mod document;
pub mod embedding;
pub mod keyword_index;
pub mod persistence;
pub mod vector_store;

pub use document::{Document, DocumentProcessor, SourceType, VersionSnapshot};
pub use embedding::{EmbeddingBackend, EmbeddingCache};
pub use keyword_index::KeywordIndex;
pub use persistence::KbPaths;
pub use vector_store::VectorStore;

use crate::error::{CoreError, CoreResult};
use crate::logging::log_info;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SearchType {
    Semantic,
    Keyword,
    Hybrid,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f32,
    pub search_type: SearchType,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
struct VersionIndexEntry {
    current_version: u32,
    versions: Vec<u32>,
    last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

pub type MetadataFilter<'a> = Option<&'a (dyn Fn(&serde_json::Value) -> bool + Sync)>;

pub struct RetrievalIndex {
    documents: RwLock<HashMap<Uuid, Document>>,
    chunk_ids_by_document: RwLock<HashMap<Uuid, Vec<Uuid>>>,
    version_index: RwLock<HashMap<Uuid, VersionIndexEntry>>,
    processor: DocumentProcessor,
    vector_store: VectorStore,
    keyword_index: KeywordIndex,
    embedding_cache: EmbeddingCache,
    embedding_backend: Arc<dyn EmbeddingBackend>,
    paths: Option<KbPaths>,
    /// Flips permanently once a persistence write has returned a `Fatal`
    /// error; surfaced through [`RetrievalIndex::is_degraded`] for a
    /// `health`-style check. Never cleared — a process that hit disk
    /// corruption or ran out of space needs a restart, not a retry.
    degraded: AtomicBool,
}

impl RetrievalIndex {
    pub fn new(
        config: &crate::config::CoreConfig,
        embedding_backend: Arc<dyn EmbeddingBackend>,
        persist: bool,
    ) -> CoreResult<Self> {
        let paths = persist.then(|| KbPaths::new(config.persist_directory.clone()));

        let (vector_store, keyword_index, embedding_cache, documents, version_index) =
            if let Some(paths) = &paths {
                let vector_store =
                    VectorStore::load(config.embedding_dimensions, paths.vectors_file())?;
                let keyword_index = KeywordIndex::load(paths.keyword_index_file())?;
                let embedding_cache = EmbeddingCache::new(
                    Some(paths.embedding_cache_file("default")),
                    config.embedding_cache_flush_every,
                    config.embedding_request_timeout,
                );
                let documents = load_json_or_default(&paths.documents_file());
                let version_index = load_json_or_default(&paths.version_index_file());
                (vector_store, keyword_index, embedding_cache, documents, version_index)
            } else {
                (
                    VectorStore::new(config.embedding_dimensions, None),
                    KeywordIndex::new(None),
                    EmbeddingCache::new(None, config.embedding_cache_flush_every, config.embedding_request_timeout),
                    HashMap::new(),
                    HashMap::new(),
                )
            };

        let chunk_ids_by_document = vector_store
            .all()
            .into_iter()
            .fold(HashMap::<Uuid, Vec<Uuid>>::new(), |mut acc, record| {
                acc.entry(record.document_id).or_default().push(record.chunk_id);
                acc
            });

        Ok(Self {
            documents: RwLock::new(documents),
            chunk_ids_by_document: RwLock::new(chunk_ids_by_document),
            version_index: RwLock::new(version_index),
            processor: DocumentProcessor::new(config.chunk_size, config.chunk_overlap),
            vector_store,
            keyword_index,
            embedding_cache,
            embedding_backend,
            paths,
            degraded: AtomicBool::new(false),
        })
    }

    /// Whether this index has hit a `Fatal` persistence error since
    /// construction. A transport's `/health` check maps this to `degraded`.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn track_fatal<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(err) = &result
            && err.category() == crate::error::ErrorCategory::Fatal
        {
            self.degraded.store(true, Ordering::Relaxed);
        }
        result
    }

    pub async fn add_document(
        &self,
        source_type: SourceType,
        source_name: impl Into<String>,
        content: impl Into<String>,
        metadata: serde_json::Value,
    ) -> CoreResult<Document> {
        let content = content.into();
        let id = Uuid::new_v4();
        let document = Document {
            id,
            source_type,
            source_name: source_name.into(),
            content: content.clone(),
            metadata,
            version: 1,
            previous_versions: vec![],
        };

        self.index_content(id, &content).await?;
        self.documents.write().unwrap().insert(id, document.clone());
        self.version_index.write().unwrap().insert(
            id,
            VersionIndexEntry {
                current_version: 1,
                versions: vec![1],
                last_updated: Some(chrono::Utc::now()),
            },
        );
        self.persist_documents()?;
        self.persist_version_index()?;
        Ok(document)
    }

    pub async fn update_document(&self, document_id: Uuid, new_content: impl Into<String>) -> CoreResult<Document> {
        let new_content = new_content.into();
        let mut documents = self.documents.write().unwrap();
        let old = documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("document", document_id.to_string()))?;
        drop(documents);

        self.snapshot_version(&old)?;
        self.remove_chunks(document_id)?;
        self.index_content(document_id, &new_content).await?;

        let new_version = old.version + 1;
        let mut updated = old.clone();
        updated.content = new_content;
        updated.version = new_version;
        updated.previous_versions.push(VersionSnapshot {
            version: old.version,
            content: old.content,
            metadata: old.metadata,
            timestamp: chrono::Utc::now(),
        });

        self.documents.write().unwrap().insert(document_id, updated.clone());
        self.bump_version_index(document_id, new_version);
        self.persist_documents()?;
        self.persist_version_index()?;
        Ok(updated)
    }

    /// Restores the content of `version` as a brand-new current version
    /// (never rewrites history in place).
    pub async fn rollback(&self, document_id: Uuid, version: u32) -> CoreResult<Document> {
        let documents = self.documents.read().unwrap();
        let current = documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("document", document_id.to_string()))?;
        drop(documents);

        let snapshot_content = if current.version == version {
            return Ok(current);
        } else {
            current
                .previous_versions
                .iter()
                .find(|s| s.version == version)
                .map(|s| s.content.clone())
                .ok_or_else(|| CoreError::not_found("document version", version.to_string()))?
        };

        self.update_document(document_id, snapshot_content).await
    }

    pub fn delete_document(&self, document_id: Uuid) -> CoreResult<()> {
        self.remove_chunks(document_id)?;
        self.documents.write().unwrap().remove(&document_id);
        self.version_index.write().unwrap().remove(&document_id);
        self.persist_documents()?;
        self.persist_version_index()?;
        Ok(())
    }

    pub fn get_document(&self, document_id: Uuid) -> CoreResult<Document> {
        self.documents
            .read()
            .unwrap()
            .get(&document_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("document", document_id.to_string()))
    }

    /// Convenience wrapper: `fuzziness` in `0..=100` maps to
    /// `(semantic_weight, keyword_weight) = (fuzziness/100, 1 - fuzziness/100)`.
    pub async fn search_fuzzy(
        &self,
        query_text: &str,
        limit: usize,
        fuzziness: u8,
        filter: MetadataFilter<'_>,
    ) -> CoreResult<Vec<SearchHit>> {
        let fuzziness = fuzziness.min(100) as f64 / 100.0;
        self.search(query_text, limit, fuzziness, 1.0 - fuzziness, filter)
            .await
    }

    pub async fn search(
        &self,
        query_text: &str,
        limit: usize,
        semantic_weight: f64,
        keyword_weight: f64,
        filter: MetadataFilter<'_>,
    ) -> CoreResult<Vec<SearchHit>> {
        if !(0.0..=1.0).contains(&semantic_weight) || !(0.0..=1.0).contains(&keyword_weight) {
            return Err(CoreError::validation("weights must be in [0,1]"));
        }
        if query_text.trim().is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let (w_s, w_k) = if semantic_weight == 0.0 && keyword_weight == 0.0 {
            (1.0, 0.0)
        } else {
            let total = semantic_weight + keyword_weight;
            (semantic_weight / total, keyword_weight / total)
        };

        if w_s >= 1.0 {
            return self.semantic_only(query_text, limit, filter).await;
        }
        if w_k >= 1.0 {
            return Ok(self.keyword_only(query_text, limit, filter));
        }

        let wide_k = limit * 2;
        let semantic_hits = self.semantic_only(query_text, wide_k, filter).await?;
        let keyword_hits = self.keyword_only(query_text, wide_k, filter);

        let mut combined: HashMap<Uuid, SearchHit> = HashMap::new();
        for hit in semantic_hits {
            combined.insert(
                hit.chunk_id,
                SearchHit {
                    score: (w_s * hit.score as f64) as f32,
                    search_type: SearchType::Semantic,
                    ..hit
                },
            );
        }
        for hit in keyword_hits {
            combined
                .entry(hit.chunk_id)
                .and_modify(|existing| {
                    existing.score += (w_k * hit.score as f64) as f32;
                    existing.search_type = SearchType::Hybrid;
                })
                .or_insert(SearchHit {
                    score: (w_k * hit.score as f64) as f32,
                    search_type: SearchType::Keyword,
                    ..hit
                });
        }

        let mut results: Vec<SearchHit> = combined.into_values().collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    async fn semantic_only(
        &self,
        query_text: &str,
        top_k: usize,
        filter: MetadataFilter<'_>,
    ) -> CoreResult<Vec<SearchHit>> {
        let vector = self
            .embedding_cache
            .get_or_compute(query_text, self.embedding_backend.as_ref())
            .await?;
        let hits = self.vector_store.query(&vector, top_k, |record| {
            filter.is_none_or(|f| f(&record.metadata))
        });
        Ok(hits
            .into_iter()
            .map(|(record, similarity)| SearchHit {
                chunk_id: record.chunk_id,
                document_id: record.document_id,
                content: record.content,
                metadata: record.metadata,
                score: similarity,
                search_type: SearchType::Semantic,
            })
            .collect())
    }

    fn keyword_only(&self, query_text: &str, top_k: usize, filter: MetadataFilter<'_>) -> Vec<SearchHit> {
        let token_count = crate::tokenize::tokenize(query_text).len().max(1);
        let hits = self.keyword_index.query(query_text);
        let records: HashMap<Uuid, vector_store::VectorRecord> = self
            .vector_store
            .all()
            .into_iter()
            .map(|r| (r.chunk_id, r))
            .collect();

        let mut scored: Vec<SearchHit> = hits
            .into_iter()
            .filter_map(|(chunk_id, count)| {
                let record = records.get(&chunk_id)?;
                if !filter.is_none_or(|f| f(&record.metadata)) {
                    return None;
                }
                let score = (count as f32 / token_count as f32).min(1.0);
                Some(SearchHit {
                    chunk_id,
                    document_id: record.document_id,
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                    score,
                    search_type: SearchType::Keyword,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }

    /// Rebuilds the vector store and keyword index from the currently live
    /// chunk set, dropping any orphan entries left by partial failures.
    pub fn compact(&self) -> CoreResult<()> {
        let live_ids: std::collections::HashSet<Uuid> = self
            .chunk_ids_by_document
            .read()
            .unwrap()
            .values()
            .flatten()
            .copied()
            .collect();
        let live_records: Vec<_> = self
            .vector_store
            .all()
            .into_iter()
            .filter(|r| live_ids.contains(&r.chunk_id))
            .collect();
        let content_pairs: Vec<(Uuid, String)> = live_records
            .iter()
            .map(|r| (r.chunk_id, r.content.clone()))
            .collect();
        self.vector_store.rebuild(live_records)?;
        self.keyword_index
            .rebuild(content_pairs.iter().map(|(id, c)| (*id, c.as_str())))?;
        log_info!(chunks = content_pairs.len(), "retrieval index compacted");
        Ok(())
    }

    async fn index_content(&self, document_id: Uuid, content: &str) -> CoreResult<()> {
        let chunks = self.processor.chunk(document_id, content);
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self
                .embedding_cache
                .get_or_compute(&chunk.content, self.embedding_backend.as_ref())
                .await?;
            self.track_fatal(self.vector_store.add(
                chunk.id,
                document_id,
                vector,
                chunk.content.clone(),
                chunk.metadata.clone(),
            ))?;
            self.track_fatal(self.keyword_index.add(chunk.id, &chunk.content))?;
            ids.push(chunk.id);
        }
        self.chunk_ids_by_document
            .write()
            .unwrap()
            .insert(document_id, ids);
        Ok(())
    }

    fn remove_chunks(&self, document_id: Uuid) -> CoreResult<()> {
        let ids = self
            .chunk_ids_by_document
            .write()
            .unwrap()
            .remove(&document_id)
            .unwrap_or_default();
        for id in ids {
            self.vector_store.remove(id)?;
            self.keyword_index.remove(id)?;
        }
        Ok(())
    }

    fn snapshot_version(&self, document: &Document) -> CoreResult<()> {
        let Some(paths) = &self.paths else { return Ok(()) };
        let snapshot = VersionSnapshot {
            version: document.version,
            content: document.content.clone(),
            metadata: document.metadata.clone(),
            timestamp: chrono::Utc::now(),
        };
        self.track_fatal(vector_store::write_json_atomic(
            &paths.version_snapshot_file(document.id, document.version),
            &snapshot,
        ))
    }

    fn bump_version_index(&self, document_id: Uuid, new_version: u32) {
        let mut index = self.version_index.write().unwrap();
        let entry = index.entry(document_id).or_default();
        entry.current_version = new_version;
        entry.versions.push(new_version);
        entry.last_updated = Some(chrono::Utc::now());
    }

    fn persist_documents(&self) -> CoreResult<()> {
        let Some(paths) = &self.paths else { return Ok(()) };
        let documents = self.documents.read().unwrap();
        self.track_fatal(vector_store::write_json_atomic(&paths.documents_file(), &*documents))
    }

    fn persist_version_index(&self) -> CoreResult<()> {
        let Some(paths) = &self.paths else { return Ok(()) };
        let index = self.version_index.read().unwrap();
        self.track_fatal(vector_store::write_json_atomic(&paths.version_index_file(), &*index))
    }
}

fn load_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &std::path::Path) -> T {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    struct DeterministicEmbedder {
        dims: usize,
    }

    #[async_trait::async_trait]
    impl EmbeddingBackend for DeterministicEmbedder {
        async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
            // Deterministic bag-of-words-ish embedding for tests: dimension i
            // counts occurrences of the i-th letter of the alphabet.
            let mut vector = vec![0.0f32; self.dims];
            for ch in text.to_lowercase().chars() {
                if let Some(i) = (ch as u32).checked_sub('a' as u32) {
                    let i = i as usize % self.dims;
                    vector[i] += 1.0;
                }
            }
            Ok(vector)
        }
    }

    fn index() -> RetrievalIndex {
        let mut config = CoreConfig::default();
        config.embedding_dimensions = 16;
        RetrievalIndex::new(&config, Arc::new(DeterministicEmbedder { dims: 16 }), false).unwrap()
    }

    #[tokio::test]
    async fn search_scores_are_bounded_and_sorted() {
        let idx = index();
        idx.add_document(SourceType::Text, "a", "kubernetes cluster deployment pipeline", serde_json::Value::Null).await.unwrap();
        idx.add_document(SourceType::Text, "b", "quarterly budget and revenue forecast", serde_json::Value::Null).await.unwrap();

        let results = idx.search("deployment pipeline", 5, 0.5, 0.5, None).await.unwrap();
        for hit in &results {
            assert!(hit.score >= 0.0 && hit.score <= 1.0);
        }
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn exact_query_chunk_scores_near_one_under_pure_semantic() {
        let idx = index();
        idx.add_document(SourceType::Text, "a", "deployment pipeline", serde_json::Value::Null)
            .await
            .unwrap();
        let results = idx.search("deployment pipeline", 1, 1.0, 0.0, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= 0.99);
    }

    #[tokio::test]
    async fn update_then_rollback_restores_old_content() {
        let idx = index();
        let doc = idx
            .add_document(SourceType::Text, "a", "original content unique marker zzz", serde_json::Value::Null)
            .await
            .unwrap();
        idx.update_document(doc.id, "replaced content").await.unwrap();

        let results = idx.search("zzz marker", 5, 0.0, 1.0, None).await.unwrap();
        assert!(results.is_empty());

        let rolled_back = idx.rollback(doc.id, 1).await.unwrap();
        assert_eq!(rolled_back.version, 3);
        assert_eq!(rolled_back.content, "original content unique marker zzz");

        let results = idx.search("zzz marker", 5, 0.0, 1.0, None).await.unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn empty_query_returns_empty() {
        let idx = index();
        let results = idx.search("", 5, 0.5, 0.5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn compact_drops_orphan_postings() {
        let idx = index();
        let doc = idx
            .add_document(SourceType::Text, "a", "orphan candidate content", serde_json::Value::Null)
            .await
            .unwrap();
        idx.delete_document(doc.id).unwrap();
        idx.compact().unwrap();
        assert_eq!(idx.vector_store.len(), 0);
    }

    #[tokio::test]
    async fn fresh_index_is_not_degraded() {
        let idx = index();
        idx.add_document(SourceType::Text, "a", "some content", serde_json::Value::Null)
            .await
            .unwrap();
        assert!(!idx.is_degraded());
    }
}
