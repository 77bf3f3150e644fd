use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaddleError>;

#[derive(Error, Debug)]
pub enum PaddleError {
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl PaddleError {
    /// Wrap an upstream client failure, keeping the whole context chain in the message
    #[inline]
    pub fn upstream(error: &anyhow::Error) -> Self {
        Self::Upstream(format!("{:#}", error))
    }
}

impl From<config::ConfigError> for PaddleError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

pub mod answer;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod http;
pub mod ingest;
pub mod openai;
pub mod server;
pub mod session;
pub mod vector_store;
