//! Documents, their versioned snapshots, and the chunker that derives
//! retrieval units from document content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    File,
    Text,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version: u32,
    pub content: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_type: SourceType,
    pub source_name: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub version: u32,
    pub previous_versions: Vec<VersionSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Splits document content into overlapping chunks, preferring to cut on
/// paragraph or sentence boundaries near the target size.
pub struct DocumentProcessor {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1).max(1)),
        }
    }

    pub fn chunk(&self, document_id: Uuid, content: &str) -> Vec<Chunk> {
        let boundaries = self.split_boundaries(content);
        let count = boundaries.len();
        boundaries
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                id: Uuid::new_v4(),
                document_id,
                content: content[start..end].to_string(),
                metadata: serde_json::json!({
                    "chunk_index": i,
                    "chunk_count": count,
                }),
            })
            .collect()
    }

    /// Returns `(start, end)` byte ranges over `content`.
    fn split_boundaries(&self, content: &str) -> Vec<(usize, usize)> {
        if content.is_empty() {
            return vec![];
        }
        if content.len() <= self.chunk_size {
            return vec![(0, content.len())];
        }

        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let tolerance = (self.chunk_size / 5).max(20);
        let mut boundaries = Vec::new();
        let mut start = 0usize;

        while start < content.len() {
            let target_end = (start + self.chunk_size).min(content.len());
            let end = if target_end >= content.len() {
                content.len()
            } else {
                find_preferred_boundary(content, target_end, tolerance)
            };
            let end = char_boundary_at_or_before(content, end.max(start + 1));
            boundaries.push((start, end));
            if end >= content.len() {
                break;
            }
            let next_start = end.saturating_sub(self.chunk_overlap);
            start = if next_start > start {
                next_start
            } else {
                start + step
            };
            start = char_boundary_at_or_before(content, start.min(content.len()));
        }
        boundaries
    }
}

fn char_boundary_at_or_before(content: &str, mut idx: usize) -> usize {
    while idx > 0 && !content.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Looks backward from `target` within `tolerance` bytes for a paragraph
/// break, then a sentence break; falls back to `target` itself.
fn find_preferred_boundary(content: &str, target: usize, tolerance: usize) -> usize {
    let window_start = target.saturating_sub(tolerance);
    let window = &content[char_boundary_at_or_before(content, window_start)
        ..char_boundary_at_or_before(content, target)];

    if let Some(pos) = window.rfind("\n\n") {
        return char_boundary_at_or_before(content, window_start + pos + 2);
    }
    if let Some(pos) = window.rfind(". ") {
        return char_boundary_at_or_before(content, window_start + pos + 2);
    }
    target
}
