#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::answer::DEFAULT_TOP_K;
use crate::answer::prompt::{CONTEXT_PLACEHOLDER, INPUT_PLACEHOLDER, PromptConfig};
use crate::embeddings::DEFAULT_EMBEDDING_DIMENSION;
use crate::embeddings::chunking::{ChunkingConfig, SUPPORTED_ENCODINGS};
use crate::http::DEFAULT_TIMEOUT_SECONDS;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const PINECONE_API_KEY_VAR: &str = "PINECONE_API_KEY";
pub const PORT_VAR: &str = "PORT";
pub const APP_ENV_VAR: &str = "APP_ENV";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Restrict CORS to `allowed_origins`
    pub production: bool,
    pub allowed_origins: Vec<String>,
    pub max_question_words: usize,
    /// Put internal error text into 500 responses
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            production: false,
            allowed_origins: vec![
                "https://localhost:3000".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_question_words: 500,
            expose_error_details: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 0.0,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PineconeConfig {
    pub control_plane_url: String,
    pub index_name: String,
    /// Data plane host; looked up through the control plane when absent
    pub index_host: Option<String>,
    pub namespace: String,
    pub dimension: u32,
    pub metric: String,
    pub cloud: String,
    pub region: String,
    pub top_k: usize,
    pub upsert_batch_size: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            control_plane_url: "https://api.pinecone.io".to_string(),
            index_name: "text-analyzer".to_string(),
            index_host: None,
            namespace: String::new(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            top_k: DEFAULT_TOP_K,
            upsert_batch_size: 100,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Turns of caller-supplied history kept per request
    pub max_history_turns: usize,
    pub max_sessions: usize,
    /// Sessions kept when eviction runs
    pub keep: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_turns: 10,
            max_sessions: 100,
            keep: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(String),
    #[error("Invalid host: {0} (cannot be empty)")]
    InvalidHost(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid index name: {0} (lowercase letters, digits and '-' only, at most 45 characters)")]
    InvalidIndexName(String),
    #[error("Invalid metric: {0} (must be 'cosine', 'euclidean' or 'dotproduct')")]
    InvalidMetric(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 20000)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid upsert batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid question word limit: {0} (must be at least 1)")]
    InvalidWordLimit(usize),
    #[error("Invalid session limits: keep {keep} must be between 1 and max_sessions {max_sessions}")]
    InvalidSessionLimits { max_sessions: usize, keep: usize },
    #[error("Invalid max history turns: {0} (must be at least 1)")]
    InvalidHistoryTurns(usize),
    #[error("Invalid chunk size: {0} (must be between 50 and 8000 tokens)")]
    InvalidChunkSize(usize),
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("Invalid prompt template: {0}")]
    InvalidPromptTemplate(String),
    #[error("Missing API key: set {0} in the environment or a .env file")]
    MissingApiKey(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, falling back to defaults when it does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// `~/.paddleprompt`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".paddleprompt"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Apply `PORT` and `APP_ENV` from the process environment
    #[inline]
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = env::var(PORT_VAR) {
            self.server.port = match port.trim().parse::<u16>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => return Err(ConfigError::InvalidPort(port)),
            };
        }

        if env::var(APP_ENV_VAR).is_ok_and(|value| value.trim().eq_ignore_ascii_case("production"))
        {
            self.server.production = true;
        }

        Ok(())
    }

    #[inline]
    pub fn openai_api_key() -> Result<String, ConfigError> {
        api_key(OPENAI_API_KEY_VAR)
    }

    #[inline]
    pub fn pinecone_api_key() -> Result<String, ConfigError> {
        api_key(PINECONE_API_KEY_VAR)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.openai.validate()?;
        self.pinecone.validate()?;
        self.session.validate()?;
        self.validate_chunking_config()?;
        self.validate_prompt_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(50..=8000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if !SUPPORTED_ENCODINGS.contains(&config.encoding.as_str()) {
            return Err(ConfigError::UnsupportedEncoding(config.encoding.clone()));
        }

        Ok(())
    }

    fn validate_prompt_config(&self) -> Result<(), ConfigError> {
        let prompt = &self.prompt;

        if let Some(system) = &prompt.system_template {
            if !system.contains(CONTEXT_PLACEHOLDER) {
                return Err(ConfigError::InvalidPromptTemplate(format!(
                    "system template must contain {}",
                    CONTEXT_PLACEHOLDER
                )));
            }
        }

        if !prompt.human_template.contains(INPUT_PLACEHOLDER) {
            return Err(ConfigError::InvalidPromptTemplate(format!(
                "human template must contain {}",
                INPUT_PLACEHOLDER
            )));
        }

        if prompt.fallback_answer.trim().is_empty() {
            return Err(ConfigError::InvalidPromptTemplate(
                "fallback answer cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }

        if self.max_question_words == 0 {
            return Err(ConfigError::InvalidWordLimit(self.max_question_words));
        }

        for origin in &self.allowed_origins {
            if origin != "*" {
                Url::parse(origin).map_err(|_| ConfigError::InvalidUrl(origin.clone()))?;
            }
        }

        Ok(())
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }
}

impl PineconeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.control_plane_url)
            .map_err(|_| ConfigError::InvalidUrl(self.control_plane_url.clone()))?;

        let name_ok = !self.index_name.is_empty()
            && self.index_name.len() <= 45
            && self
                .index_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !name_ok {
            return Err(ConfigError::InvalidIndexName(self.index_name.clone()));
        }

        if let Some(host) = &self.index_host {
            if host.trim().is_empty() {
                return Err(ConfigError::InvalidUrl(host.clone()));
            }
        }

        if !["cosine", "euclidean", "dotproduct"].contains(&self.metric.as_str()) {
            return Err(ConfigError::InvalidMetric(self.metric.clone()));
        }

        if !(1..=20000).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if !(1..=1000).contains(&self.upsert_batch_size) {
            return Err(ConfigError::InvalidBatchSize(self.upsert_batch_size));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history_turns == 0 {
            return Err(ConfigError::InvalidHistoryTurns(self.max_history_turns));
        }

        if self.keep == 0 || self.keep > self.max_sessions {
            return Err(ConfigError::InvalidSessionLimits {
                max_sessions: self.max_sessions,
                keep: self.keep,
            });
        }

        Ok(())
    }
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

fn validate_retry_attempts(attempts: u32) -> Result<(), ConfigError> {
    if !(1..=10).contains(&attempts) {
        return Err(ConfigError::InvalidRetryAttempts(attempts));
    }
    Ok(())
}

fn api_key(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingApiKey(var)),
    }
}
