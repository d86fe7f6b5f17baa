//! On-disk layout for the retrieval index: one directory, fixed file names.

use std::path::{Path, PathBuf};

pub struct KbPaths {
    root: PathBuf,
}

impl KbPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn documents_file(&self) -> PathBuf {
        self.root.join("documents.json")
    }

    pub fn vectors_file(&self) -> PathBuf {
        self.root.join("vectors").join("collection.json")
    }

    pub fn keyword_index_file(&self) -> PathBuf {
        self.root.join("keyword_index.json")
    }

    pub fn version_index_file(&self) -> PathBuf {
        self.root.join("version_index.json")
    }

    pub fn version_snapshot_file(&self, document_id: uuid::Uuid, version: u32) -> PathBuf {
        self.root
            .join("versions")
            .join(format!("{document_id}_v{version}.json"))
    }

    pub fn embedding_cache_file(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}_embedding_cache.json"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
