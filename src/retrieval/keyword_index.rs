//! Inverted keyword index: `token -> chunk ids`, with per-chunk hit counts
//! on query.

use crate::error::CoreResult;
use crate::retrieval::vector_store::write_json_atomic;
use crate::tokenize::tokenize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;
use uuid::Uuid;

struct State {
    postings: HashMap<String, HashSet<Uuid>>,
    chunk_tokens: HashMap<Uuid, Vec<String>>,
}

pub struct KeywordIndex {
    state: RwLock<State>,
    persist_path: Option<PathBuf>,
}

impl KeywordIndex {
    pub fn new(persist_path: Option<PathBuf>) -> Self {
        Self {
            state: RwLock::new(State {
                postings: HashMap::new(),
                chunk_tokens: HashMap::new(),
            }),
            persist_path,
        }
    }

    pub fn load(persist_path: PathBuf) -> CoreResult<Self> {
        let index = Self::new(Some(persist_path.clone()));
        if persist_path.exists() {
            let raw = std::fs::read_to_string(&persist_path)
                .map_err(|e| crate::error::CoreError::fatal(format!("reading keyword index: {e}")))?;
            let snapshot: HashMap<Uuid, Vec<String>> = serde_json::from_str(&raw)
                .map_err(|e| crate::error::CoreError::fatal(format!("parsing keyword index: {e}")))?;
            let mut state = index.state.write().unwrap();
            for (chunk_id, tokens) in snapshot {
                for token in &tokens {
                    state
                        .postings
                        .entry(token.clone())
                        .or_default()
                        .insert(chunk_id);
                }
                state.chunk_tokens.insert(chunk_id, tokens);
            }
        }
        Ok(index)
    }

    pub fn add(&self, chunk_id: Uuid, text: &str) -> CoreResult<()> {
        let tokens = tokenize(text);
        let mut state = self.state.write().unwrap();
        for token in &tokens {
            state
                .postings
                .entry(token.clone())
                .or_default()
                .insert(chunk_id);
        }
        state.chunk_tokens.insert(chunk_id, tokens);
        drop(state);
        self.persist()
    }

    pub fn remove(&self, chunk_id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().unwrap();
        if let Some(tokens) = state.chunk_tokens.remove(&chunk_id) {
            for token in tokens {
                if let Some(set) = state.postings.get_mut(&token) {
                    set.remove(&chunk_id);
                    if set.is_empty() {
                        state.postings.remove(&token);
                    }
                }
            }
        }
        drop(state);
        self.persist()
    }

    /// Accumulates per-chunk hit counts across all query tokens.
    pub fn query(&self, query_text: &str) -> HashMap<Uuid, usize> {
        let tokens = tokenize(query_text);
        let state = self.state.read().unwrap();
        let mut hits: HashMap<Uuid, usize> = HashMap::new();
        for token in &tokens {
            if let Some(ids) = state.postings.get(token) {
                for id in ids {
                    *hits.entry(*id).or_insert(0) += 1;
                }
            }
        }
        hits
    }

    pub fn token_count_for(&self, chunk_id: Uuid) -> usize {
        self.state
            .read()
            .unwrap()
            .chunk_tokens
            .get(&chunk_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Rebuilds from a fresh `(chunk_id, content)` iterator, dropping any
    /// postings for ids no longer present (orphan removal after compaction).
    pub fn rebuild<'a>(&self, chunks: impl Iterator<Item = (Uuid, &'a str)>) -> CoreResult<()> {
        let mut state = self.state.write().unwrap();
        state.postings.clear();
        state.chunk_tokens.clear();
        for (chunk_id, text) in chunks {
            let tokens = tokenize(text);
            for token in &tokens {
                state
                    .postings
                    .entry(token.clone())
                    .or_default()
                    .insert(chunk_id);
            }
            state.chunk_tokens.insert(chunk_id, tokens);
        }
        drop(state);
        self.persist()
    }

    fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let state = self.state.read().unwrap();
        write_json_atomic(path, &state.chunk_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_counts_keyword_hits_per_chunk() {
        let index = KeywordIndex::new(None);
        let a = Uuid::new_v4();
        index.add(a, "kubernetes cluster deployment pipeline").unwrap();
        let hits = index.query("kubernetes deployment pipeline");
        assert_eq!(hits.get(&a), Some(&3));
    }

    #[test]
    fn remove_drops_all_postings_for_a_chunk() {
        let index = KeywordIndex::new(None);
        let a = Uuid::new_v4();
        index.add(a, "budget forecast revenue").unwrap();
        index.remove(a).unwrap();
        assert!(index.query("budget forecast revenue").is_empty());
    }

    #[test]
    fn rebuild_drops_orphan_postings() {
        let index = KeywordIndex::new(None);
        let a = Uuid::new_v4();
        index.add(a, "stale content").unwrap();
        let b = Uuid::new_v4();
        index.rebuild(std::iter::once((b, "fresh content"))).unwrap();
        assert!(index.query("stale").is_empty());
        assert!(!index.query("fresh").is_empty());
    }
}
