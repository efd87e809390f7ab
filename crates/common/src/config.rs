use crate::error::VecSearchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vecsearch.toml";

/// Which embedding backend produces vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Remote Ollama server (`/api/embed`)
    Ollama,
    /// Local feature-hashing embedder, no model download required
    Hashing,
}

/// vecsearch application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Reference corpus (JSON array of records)
    pub corpus_path: PathBuf,

    /// Snapshot directory for the persisted index
    pub vector_index_path: PathBuf,

    /// Embedding backend
    pub embedding_provider: EmbeddingProviderKind,

    /// Embedding model name
    pub embedding_model: String,

    /// Ollama API base URL
    pub ollama_base_url: String,

    /// Output dimension of the hashing embedder
    pub hashing_dim: usize,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Base URL of a running vector search service (used by the analyzer client)
    pub vector_service_url: String,

    /// Timeout applied by callers around a whole search request
    pub search_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 7000,
            corpus_path: PathBuf::from("./db/corpus.json"),
            vector_index_path: PathBuf::from("./db/vector_index"),
            embedding_provider: EmbeddingProviderKind::Ollama,
            embedding_model: "all-minilm".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            hashing_dim: 384,
            log_dir: PathBuf::from("./db/log"),
            log_level: "info".to_string(),
            vector_service_url: "http://localhost:7000".to_string(),
            search_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Layer defaults, an optional config file and the environment.
    ///
    /// An explicit `file` must exist; the default `vecsearch.toml` is optional.
    /// Environment keys are the upper-cased field names (`SERVER_PORT`, ...).
    pub fn load(file: Option<&Path>) -> Result<Self, VecSearchError> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| VecSearchError::config(format!("Invalid defaults: {}", e)))?;

        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = config::Config::builder()
            .add_source(defaults)
            .add_source(file_source)
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| VecSearchError::config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Ensure the log directory exists, create if not
    pub fn ensure_directories(&self) -> Result<(), VecSearchError> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir).map_err(|e| {
                VecSearchError::config(format!(
                    "Failed to create directory {}: {}",
                    self.log_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Get server bind address (host:port)
    pub fn server_bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), VecSearchError> {
        if self.embedding_model.trim().is_empty() {
            return Err(VecSearchError::config("Embedding model name cannot be empty"));
        }

        for (name, url) in [
            ("Ollama base URL", &self.ollama_base_url),
            ("Vector service URL", &self.vector_service_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(VecSearchError::config(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        if self.server_port == 0 {
            return Err(VecSearchError::config("Server port cannot be 0"));
        }

        if self.embedding_provider == EmbeddingProviderKind::Hashing && self.hashing_dim == 0 {
            return Err(VecSearchError::config("Hashing embedder dimension cannot be 0"));
        }

        if self.search_timeout_secs == 0 {
            return Err(VecSearchError::config("Search timeout cannot be 0"));
        }

        Ok(())
    }
}
