/// vecsearch error types
#[derive(Debug, thiserror::Error)]
pub enum VecSearchError {
    /// Corpus store returned no records to index
    #[error("Corpus is empty, nothing to index")]
    EmptyCorpus,

    /// Embedding provider failed or returned malformed output
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// No snapshot at the configured location
    #[error("Snapshot missing: {0}")]
    SnapshotMissing(String),

    /// Snapshot exists but cannot be trusted
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Index could not be made ready for queries
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Corpus store could not be read
    #[error("Corpus store error: {0}")]
    Corpus(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VecSearchError {
    /// Create embedding provider error
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    pub fn snapshot_missing<S: Into<String>>(msg: S) -> Self {
        Self::SnapshotMissing(msg.into())
    }

    pub fn corrupt_snapshot<S: Into<String>>(msg: S) -> Self {
        Self::CorruptSnapshot(msg.into())
    }

    pub fn service_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// Create validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn corpus<S: Into<String>>(msg: S) -> Self {
        Self::Corpus(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Owned copy of an error held behind an `Arc`.
    ///
    /// Wrapped foreign errors (io, json, anyhow) collapse into `Internal`
    /// carrying their message.
    pub fn cloned(&self) -> Self {
        match self {
            Self::EmptyCorpus => Self::EmptyCorpus,
            Self::Provider(m) => Self::Provider(m.clone()),
            Self::SnapshotMissing(m) => Self::SnapshotMissing(m.clone()),
            Self::CorruptSnapshot(m) => Self::CorruptSnapshot(m.clone()),
            Self::ServiceUnavailable(m) => Self::ServiceUnavailable(m.clone()),
            Self::Validation(m) => Self::Validation(m.clone()),
            Self::Corpus(m) => Self::Corpus(m.clone()),
            Self::Config(m) => Self::Config(m.clone()),
            Self::Network(m) => Self::Network(m.clone()),
            Self::Internal(m) => Self::Internal(m.clone()),
            Self::Io(e) => Self::Internal(format!("IO error: {}", e)),
            Self::Json(e) => Self::Internal(format!("JSON error: {}", e)),
            Self::Other(e) => Self::Internal(e.to_string()),
        }
    }
}

// HTTP response conversion
impl VecSearchError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::EmptyCorpus => 404,
            Self::SnapshotMissing(_) => 404,
            Self::ServiceUnavailable(_) => 503,
            Self::Network(_) => 503,
            Self::Provider(_) => 500,
            Self::CorruptSnapshot(_) => 500,
            Self::Corpus(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
            Self::Io(_) => 500,
            Self::Json(_) => 500,
            Self::Other(_) => 500,
        }
    }

    /// Short machine-readable kind, used as the `error` field of API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyCorpus => "EmptyCorpus",
            Self::Provider(_) => "ProviderError",
            Self::SnapshotMissing(_) => "SnapshotMissing",
            Self::CorruptSnapshot(_) => "CorruptSnapshot",
            Self::ServiceUnavailable(_) => "ServiceUnavailable",
            Self::Validation(_) => "ValidationError",
            Self::Corpus(_) => "CorpusError",
            Self::Config(_) => "ConfigError",
            Self::Network(_) => "NetworkError",
            Self::Internal(_) | Self::Io(_) | Self::Json(_) | Self::Other(_) => "InternalError",
        }
    }
}
