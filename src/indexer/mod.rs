// Indexer module
// Turns markdown files into chunk + vector rows and answers queries against them

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::VecDbError;
use crate::config::Config;
use crate::database::sqlite::models::{ConsistencyReport, DocumentSummary, NewChunk, SearchHit};
use crate::database::{VecDatabase, db_path_for, expand_home};
use crate::embeddings::{Embedder, MarkdownChunker, create_embedder};

#[cfg(test)]
mod tests;

/// Default number of results returned by a search
pub const DEFAULT_TOP_K: usize = 5;

/// Chunks written for one markdown file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub db_path: PathBuf,
    pub chunks: usize,
}

/// Outcome of ingesting a docs root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub root: PathBuf,
    pub files: Vec<FileReport>,
    pub total_files: usize,
    pub total_chunks: usize,
}

/// Contents of one storage unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub db_path: PathBuf,
    pub exists: bool,
    pub chunk_count: i64,
    pub vector_count: i64,
    pub documents: Vec<DocumentSummary>,
    pub consistency: ConsistencyReport,
}

/// Ingest, search and clear operations over per-document vector databases
pub struct VecDbService {
    config: Config,
    embedder: Arc<dyn Embedder>,
    chunker: MarkdownChunker,
}

impl VecDbService {
    #[inline]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config
            .chunking
            .validate()
            .map_err(|e| VecDbError::Config(e.to_string()))?;
        let chunker = MarkdownChunker::new(&config.chunking)?;

        Ok(Self {
            config,
            embedder,
            chunker,
        })
    }

    /// Build the service with the embedder selected by the configuration
    #[inline]
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        Self::new(config, embedder)
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Storage file used for `md_file`
    #[inline]
    pub fn db_path(&self, md_file: &Path, save_path: Option<&Path>) -> PathBuf {
        let save_path = save_path.map(expand_home);
        db_path_for(&expand_home(md_file), save_path.as_deref())
    }

    /// Ingest every markdown file under `root`, one file at a time.
    ///
    /// The first failing file stops the walk; files committed before it stay.
    #[inline]
    pub async fn build_vec_db(&self, root: &Path, save_path: Option<&Path>) -> Result<IngestReport> {
        let root = expand_home(root);
        let root = fs::canonicalize(&root)
            .await
            .with_context(|| format!("Docs root not found: {}", root.display()))?;

        info!("Ingesting markdown files under {}", root.display());

        let files = self.markdown_files(&root)?;
        let mut report = IngestReport {
            root,
            ..IngestReport::default()
        };

        for path in files {
            let chunks = self.ingest_file(&path, save_path).await?;
            report.files.push(FileReport {
                db_path: self.db_path(&path, save_path),
                path,
                chunks,
            });
            report.total_chunks += chunks;
        }
        report.total_files = report.files.len();

        info!(
            "Ingested {} chunks from {} files",
            report.total_chunks, report.total_files
        );
        Ok(report)
    }

    fn markdown_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("Failed to walk docs root {}", root.display()))?;
            if entry.file_type().is_file() && self.config.is_markdown(entry.path()) {
                files.push(entry.into_path());
            }
        }

        debug!("Found {} markdown files under {}", files.len(), root.display());
        Ok(files)
    }

    /// Chunk, embed and store one markdown file, returning the number of chunks written
    #[inline]
    pub async fn ingest_file(&self, md_file: &Path, save_path: Option<&Path>) -> Result<usize> {
        let md_file = std::path::absolute(expand_home(md_file))
            .with_context(|| format!("Failed to resolve {}", md_file.display()))?;
        let text = fs::read_to_string(&md_file)
            .await
            .with_context(|| format!("Failed to read {}", md_file.display()))?;

        let chunks = self.chunker.chunk(&text);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(texts).await?;

        let doc = md_file.to_string_lossy().into_owned();
        let rows: Vec<(NewChunk, Vec<f32>)> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                (
                    NewChunk {
                        doc: doc.clone(),
                        heading: chunk.heading,
                        chunk: chunk.text,
                    },
                    vector,
                )
            })
            .collect();

        let db_path = self.db_path(&md_file, save_path);
        let database = VecDatabase::open(&db_path, self.embedder.dimension()).await?;
        let inserted = database.insert_chunks(&rows).await;
        database.close().await;
        let inserted = inserted.with_context(|| format!("Failed to store {}", md_file.display()))?;

        info!(
            "Stored {} chunks from {} in {}",
            inserted.len(),
            md_file.display(),
            db_path.display()
        );
        Ok(inserted.len())
    }

    /// Up to `top_k` chunks closest to `query_text`, most similar first
    #[inline]
    pub async fn search_vec_db(
        &self,
        query_text: &str,
        md_file_path: &Path,
        top_k: usize,
        save_path: Option<&Path>,
    ) -> Result<Vec<SearchHit>> {
        let db_path = self.db_path(md_file_path, save_path);
        debug!("Searching {} (top_k = {})", db_path.display(), top_k);

        if !db_exists(&db_path).await? {
            debug!("{} does not exist, nothing to search", db_path.display());
            return Ok(Vec::new());
        }

        let mut vectors = self.embed(vec![query_text.to_string()]).await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| VecDbError::Embedding("model returned no vector".to_string()))?;

        let database = VecDatabase::open(&db_path, self.embedder.dimension()).await?;
        let hits = database.search(&query_vector, top_k).await;
        database.close().await;
        hits
    }

    /// Empty the storage unit of `md_file_path`, returning its path
    #[inline]
    pub async fn clear_vec_db(
        &self,
        md_file_path: &Path,
        save_path: Option<&Path>,
    ) -> Result<PathBuf> {
        let db_path = self.db_path(md_file_path, save_path);

        let database = VecDatabase::open(&db_path, self.embedder.dimension()).await?;
        let cleared = database.clear().await;
        database.close().await;
        cleared?;

        Ok(db_path)
    }

    /// Counts, documents and consistency of a storage unit, without creating it
    #[inline]
    pub async fn status(&self, md_file_path: &Path, save_path: Option<&Path>) -> Result<StoreStatus> {
        let db_path = self.db_path(md_file_path, save_path);

        if !db_exists(&db_path).await? {
            return Ok(StoreStatus {
                db_path,
                exists: false,
                chunk_count: 0,
                vector_count: 0,
                documents: Vec::new(),
                consistency: ConsistencyReport::default(),
            });
        }

        let database = VecDatabase::open(&db_path, self.embedder.dimension()).await?;
        let consistency = database.consistency_report().await;
        let documents = database.documents().await;
        database.close().await;
        let consistency = consistency?;

        Ok(StoreStatus {
            db_path,
            exists: true,
            chunk_count: consistency.chunk_count,
            vector_count: consistency.vector_count,
            documents: documents?,
            consistency,
        })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embedder = Arc::clone(&self.embedder);
        let count = texts.len();
        let vectors = tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .context("Embedding task failed")??;

        crate::embeddings::check_vectors(&vectors, count, self.embedder.dimension())?;
        debug!("Embedded {} texts", count);
        Ok(vectors)
    }
}

async fn db_exists(db_path: &Path) -> Result<bool> {
    fs::try_exists(db_path)
        .await
        .with_context(|| format!("Failed to check for database {}", db_path.display()))
}
