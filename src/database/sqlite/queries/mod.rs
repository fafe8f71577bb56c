
use super::models::*;
use crate::VecDbError;
use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

/// Encode a vector as the little-endian f32 blob sqlite-vec reads
#[inline]
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Insert a chunk row and its vector row (`rowid = chunk id`) on `conn`.
    ///
    /// Callers pass a transaction so the pair is written together.
    #[inline]
    pub async fn insert(
        conn: &mut SqliteConnection,
        chunk: &NewChunk,
        vector: &[f32],
        dimension: usize,
    ) -> Result<i64> {
        if vector.len() != dimension {
            return Err(VecDbError::Embedding(format!(
                "dimension mismatch: expected {}, got {}",
                dimension,
                vector.len()
            ))
            .into());
        }

        let id = sqlx::query("INSERT INTO chunks (doc, heading, chunk) VALUES (?, ?, ?)")
            .bind(&chunk.doc)
            .bind(&chunk.heading)
            .bind(&chunk.chunk)
            .execute(&mut *conn)
            .await
            .context("Failed to insert chunk")?
            .last_insert_rowid();

        sqlx::query("INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)")
            .bind(id)
            .bind(vector_to_blob(vector))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert vector for chunk {}", id))?;

        Ok(id)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")?;

        Ok(count)
    }

    #[inline]
    pub async fn documents(pool: &SqlitePool) -> Result<Vec<DocumentSummary>> {
        let documents = sqlx::query_as::<_, DocumentSummary>(
            "SELECT doc, COUNT(*) AS chunk_count FROM chunks GROUP BY doc ORDER BY doc",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(documents)
    }

    /// Chunk ids that have no row in the vector index
    #[inline]
    pub async fn ids_without_vectors(pool: &SqlitePool) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM chunks WHERE id NOT IN (SELECT rowid FROM vec_chunks) ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .context("Failed to find chunks without vectors")?;

        Ok(ids)
    }
}

pub struct VectorQueries;

impl VectorQueries {
    /// Nearest chunks by cosine distance, closest first
    #[inline]
    pub async fn search(pool: &SqlitePool, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let limit = i64::try_from(k).unwrap_or(i64::MAX);

        let hits = sqlx::query_as::<_, SearchHit>(
            r#"
            SELECT chunks.doc AS doc,
                   chunks.chunk AS chunk,
                   vec_distance_cosine(vec_chunks.embedding, ?) AS score
            FROM vec_chunks
            JOIN chunks ON chunks.id = vec_chunks.rowid
            ORDER BY score
            LIMIT ?
            "#,
        )
        .bind(vector_to_blob(query_vector))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search vectors")?;

        debug!("Vector search returned {} hits (k = {})", hits.len(), k);
        Ok(hits)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vec_chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count vectors")?;

        Ok(count)
    }

    /// Vector rowids that have no chunk row
    #[inline]
    pub async fn rowids_without_chunks(pool: &SqlitePool) -> Result<Vec<i64>> {
        let rowids: Vec<i64> = sqlx::query_scalar(
            "SELECT rowid FROM vec_chunks WHERE rowid NOT IN (SELECT id FROM chunks) ORDER BY rowid",
        )
        .fetch_all(pool)
        .await
        .context("Failed to find vectors without chunks")?;

        Ok(rowids)
    }

}
