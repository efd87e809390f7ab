use serde::{Deserialize, Serialize};
use vecsearch_index::{IndexState, SimilarRecord};

/// Search request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,

    /// Number of results
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SimilarRecord>,
    pub total_found: usize,
}

/// POST /build-index response
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildIndexResponse {
    pub success: bool,
    pub message: String,
    pub total_documents: usize,
    pub embedding_dim: usize,
}

/// POST /load-index response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoadIndexResponse {
    pub success: bool,
    pub message: String,
    pub total_documents: usize,
}

/// GET /health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub embedding_model: String,
    pub index_status: IndexState,
    pub indexed_documents: usize,
}

/// Error body for every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind, e.g. `ServiceUnavailable`
    pub error: String,
    pub detail: String,
}
