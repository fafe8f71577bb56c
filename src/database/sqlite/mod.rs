use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::os::raw::c_int;
use std::sync::OnceLock;
use tracing::{debug, error, info};

use crate::VecDbError;
use crate::database::sqlite::models::{ConsistencyReport, DocumentSummary, NewChunk, SearchHit};
use crate::database::sqlite::queries::{ChunkQueries, VectorQueries};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

static SQLITE_VEC_REGISTRATION: OnceLock<c_int> = OnceLock::new();

/// Make the `vec0` module and the `vec_*` SQL functions available on every
/// connection opened after this call. Registration runs once per process;
/// later calls report the recorded outcome.
fn register_sqlite_vec() -> Result<()> {
    let rc = *SQLITE_VEC_REGISTRATION.get_or_init(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point exported by the
        // sqlite-vec crate and has the signature SQLite expects for an auto
        // extension. The transmute only erases the pointer type at the FFI boundary.
        #[allow(clippy::missing_transmute_annotations)]
        let rc = unsafe {
            libsqlite3_sys::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )))
        };
        if rc == libsqlite3_sys::SQLITE_OK {
            debug!("Registered sqlite-vec extension");
        } else {
            error!("Failed to register sqlite-vec extension (code {})", rc);
        }
        rc
    });

    check_registration(rc)
}

fn check_registration(rc: c_int) -> Result<()> {
    if rc == libsqlite3_sys::SQLITE_OK {
        Ok(())
    } else {
        Err(VecDbError::Database(format!(
            "sqlite-vec extension could not be registered (SQLite code {})",
            rc
        ))
        .into())
    }
}

/// One storage unit: the `chunks` table plus its `vec_chunks` vector index.
#[derive(Debug, Clone)]
pub struct VecDatabase {
    pool: DbPool,
    path: PathBuf,
    dimension: usize,
}

impl VecDatabase {
    /// Open (creating if missing) the storage unit at `path` for vectors of
    /// `dimension` floats.
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if dimension == 0 {
            return Err(VecDbError::Database("vector dimension must be positive".to_string()).into());
        }

        register_sqlite_vec()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        let database = Self {
            pool,
            path,
            dimension,
        };
        database.initialize_schema().await?;
        database.check_dimension().await?;

        debug!(
            "Opened vector database {} ({} dimensions)",
            database.path.display(),
            database.dimension
        );
        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create both tables if they do not exist yet
    pub async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks(
                id INTEGER PRIMARY KEY,
                doc TEXT,
                heading TEXT,
                chunk TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create chunks table")?;

        sqlx::query(&vec_table_sql(self.dimension))
            .execute(&self.pool)
            .await
            .context("Failed to create vec_chunks table")?;

        Ok(())
    }

    async fn check_dimension(&self) -> Result<()> {
        let create_sql: Option<String> = sqlx::query_scalar(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'vec_chunks'",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read vec_chunks schema")?;

        let stored = create_sql.as_deref().and_then(parse_vec_dimension);
        match stored {
            Some(stored) if stored != self.dimension => Err(VecDbError::Database(format!(
                "{} stores {}-dimensional vectors but the embedding model produces {}",
                self.path.display(),
                stored,
                self.dimension
            ))
            .into()),
            _ => Ok(()),
        }
    }

    /// Insert chunks and their vectors in one transaction, returning the new ids.
    ///
    /// Nothing is written if any insert fails.
    #[inline]
    pub async fn insert_chunks(&self, chunks: &[(NewChunk, Vec<f32>)]) -> Result<Vec<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin insert transaction")?;

        let mut ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks {
            let id = ChunkQueries::insert(&mut *tx, chunk, vector, self.dimension).await?;
            ids.push(id);
        }

        tx.commit()
            .await
            .context("Failed to commit inserted chunks")?;
        debug!("Inserted {} chunks into {}", ids.len(), self.path.display());
        Ok(ids)
    }

    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimension {
            return Err(VecDbError::Database(format!(
                "query vector has {} dimensions, expected {}",
                query_vector.len(),
                self.dimension
            ))
            .into());
        }

        VectorQueries::search(&self.pool, query_vector, k).await
    }

    /// Remove every chunk and rebuild an empty vector index, atomically
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        info!("Clearing {}", self.path.display());

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin clear transaction")?;

        sqlx::query("DELETE FROM chunks")
            .execute(&mut *tx)
            .await
            .context("Failed to delete chunks")?;
        sqlx::query("DROP TABLE IF EXISTS vec_chunks")
            .execute(&mut *tx)
            .await
            .context("Failed to drop vec_chunks")?;
        sqlx::query(&vec_table_sql(self.dimension))
            .execute(&mut *tx)
            .await
            .context("Failed to recreate vec_chunks")?;

        tx.commit().await.context("Failed to commit clear")?;
        Ok(())
    }

    #[inline]
    pub async fn count_chunks(&self) -> Result<i64> {
        ChunkQueries::count(&self.pool).await
    }

    #[inline]
    pub async fn count_vectors(&self) -> Result<i64> {
        VectorQueries::count(&self.pool).await
    }

    #[inline]
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        ChunkQueries::documents(&self.pool).await
    }

    /// Compare chunk ids with vector rowids
    #[inline]
    pub async fn consistency_report(&self) -> Result<ConsistencyReport> {
        let chunks_without_vectors = ChunkQueries::ids_without_vectors(&self.pool).await?;
        let vectors_without_chunks = VectorQueries::rowids_without_chunks(&self.pool).await?;

        let report = ConsistencyReport {
            chunk_count: self.count_chunks().await?,
            vector_count: self.count_vectors().await?,
            chunks_without_vectors,
            vectors_without_chunks,
        };

        if !report.is_consistent() {
            debug!("Inconsistent storage unit {}: {}", self.path.display(), report);
        }
        Ok(report)
    }

    /// Close the connection pool, flushing the database file
    #[inline]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn vec_table_sql(dimension: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(embedding float[{}])",
        dimension
    )
}

/// Dimension declared in a `vec0` CREATE statement (`float[N]`)
pub(crate) fn parse_vec_dimension(create_sql: &str) -> Option<usize> {
    let (_, after) = create_sql.split_once("float[")?;
    let (dimension, _) = after.split_once(']')?;
    dimension.trim().parse().ok()
}
