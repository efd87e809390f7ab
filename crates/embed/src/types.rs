use serde::{Deserialize, Serialize};

/// Ollama batch embedding request (`POST /api/embed`)
#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest {
    /// Model name (e.g., "all-minilm", "nomic-embed-text")
    pub model: String,

    /// Texts to embed, order preserved in the response
    pub input: Vec<String>,
}

/// Ollama batch embedding response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedResponse {
    /// Model name
    #[serde(default)]
    pub model: String,

    /// One vector per input text
    pub embeddings: Vec<Vec<f32>>,
}
