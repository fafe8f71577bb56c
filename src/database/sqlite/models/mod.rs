#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chunk row before insertion; the id is assigned by SQLite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChunk {
    pub doc: String,
    pub heading: Option<String>,
    pub chunk: String,
}

/// One ranked search result. Lower `score` means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SearchHit {
    pub doc: String,
    pub chunk: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentSummary {
    pub doc: String,
    pub chunk_count: i64,
}

/// Agreement between the chunk table and the vector index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub chunk_count: i64,
    pub vector_count: i64,
    pub chunks_without_vectors: Vec<i64>,
    pub vectors_without_chunks: Vec<i64>,
}

impl ConsistencyReport {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.chunks_without_vectors.is_empty() && self.vectors_without_chunks.is_empty()
    }
}

impl std::fmt::Display for ConsistencyReport {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_consistent() {
            write!(
                f,
                "consistent ({} chunks, {} vectors)",
                self.chunk_count, self.vector_count
            )
        } else {
            write!(
                f,
                "{} chunks without vectors, {} vectors without chunks",
                self.chunks_without_vectors.len(),
                self.vectors_without_chunks.len()
            )
        }
    }
}
