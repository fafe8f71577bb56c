// Configuration management module
// Chunking, embedding and ingest parameters live here instead of process-wide constants

pub mod settings;

pub use settings::{ChunkingConfig, Config, ConfigError, EmbeddingConfig, EmbeddingProvider, IngestConfig};

