
use std::sync::Mutex;

use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use super::{Embedder, check_vectors};
use crate::VecDbError;
use crate::config::EmbeddingConfig;

pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Sentence-embedding models that can be selected by name, with their output size
const KNOWN_MODELS: &[(&str, usize)] = &[
    ("all-MiniLM-L6-v2", 384),
    ("all-MiniLM-L12-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("paraphrase-multilingual-MiniLM-L12-v2", 384),
    ("multilingual-e5-small", 384),
];

/// Output dimension of a supported model, by name
#[inline]
pub fn known_model_dimension(name: &str) -> Option<usize> {
    KNOWN_MODELS
        .iter()
        .find(|(model, _)| *model == name)
        .map(|(_, dim)| *dim)
}

fn resolve_model(name: &str) -> Option<EmbeddingModel> {
    match name {
        "all-MiniLM-L6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "all-MiniLM-L12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
        "paraphrase-multilingual-MiniLM-L12-v2" => Some(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "multilingual-e5-small" => Some(EmbeddingModel::MultilingualE5Small),
        _ => None,
    }
}

/// Local ONNX sentence-embedding model loaded through fastembed.
///
/// The model is downloaded into the cache directory on first use.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl FastEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = resolve_model(&config.model)
            .ok_or_else(|| VecDbError::Config(format!("Unknown fastembed model: {}", config.model)))?;
        let dimension = known_model_dimension(&config.model).unwrap_or(config.dimension);

        let mut options =
            InitOptions::new(model).with_show_download_progress(config.show_download_progress);
        if let Some(cache_dir) = &config.cache_dir {
            options = options.with_cache_dir(cache_dir.clone());
        }

        info!("Loading embedding model {}", config.model);
        let text_embedding = TextEmbedding::try_new(options)
            .map_err(|e| VecDbError::Embedding(e.to_string()))
            .with_context(|| format!("Failed to load embedding model {}", config.model))?;

        Ok(Self {
            model: Mutex::new(text_embedding),
            model_name: config.model.clone(),
            dimension,
            batch_size: config.batch_size,
        })
    }
}

impl Embedder for FastEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {} (batch size {})",
            texts.len(),
            self.model_name,
            self.batch_size
        );

        let mut model = self
            .model
            .lock()
            .map_err(|_| VecDbError::Embedding("embedding model lock poisoned".to_string()))?;
        let vectors = model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| VecDbError::Embedding(e.to_string()))?;

        check_vectors(&vectors, texts.len(), self.dimension)?;
        Ok(vectors)
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.model_name
    }
}
