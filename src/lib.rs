use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Corrupted index: {0}")]
    Corruption(String),

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod http;
pub mod index;
pub mod llm;
pub mod normalize;
pub mod preprocess;
pub mod ranking;
pub mod retrieval;
