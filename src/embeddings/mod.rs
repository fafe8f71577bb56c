// Embeddings module
// Markdown chunking plus the embedding models that turn chunks into vectors

pub mod chunking;
pub mod hashing;
pub mod local;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::VecDbError;
use crate::config::{ConfigError, EmbeddingConfig, EmbeddingProvider};

pub use chunking::{ChunkingConfig, MarkdownChunker, TextChunk};
pub use hashing::HashingEmbedder;
pub use local::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_MODEL, FastEmbedder};

/// A sentence-embedding model producing fixed-length vectors.
///
/// Every input text yields exactly one vector of `dimension()` floats.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    /// Embed a single text
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| VecDbError::Embedding("model returned no vector".to_string()).into())
    }
}

/// Build the embedder selected by the configuration.
#[inline]
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Fastembed => Arc::new(FastEmbedder::new(config)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
    };

    if embedder.dimension() != config.dimension {
        return Err(VecDbError::Config(
            ConfigError::ModelDimensionMismatch {
                model: embedder.model_name().to_string(),
                configured: config.dimension,
                expected: embedder.dimension(),
            }
            .to_string(),
        )
        .into());
    }

    info!(
        "Using embedding model {} ({} dimensions)",
        embedder.model_name(),
        embedder.dimension()
    );
    Ok(embedder)
}

/// Check that a batch of vectors matches the expected count and dimension
pub(crate) fn check_vectors(vectors: &[Vec<f32>], count: usize, dimension: usize) -> Result<()> {
    if vectors.len() != count {
        return Err(VecDbError::Embedding(format!(
            "expected {} vectors, model returned {}",
            count,
            vectors.len()
        ))
        .into());
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(VecDbError::Embedding(format!(
            "dimension mismatch: expected {}, got {}",
            dimension,
            bad.len()
        ))
        .into());
    }

    Ok(())
}
