use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use vecsearch_common::{Result, VecSearchError};

use crate::provider::EmbeddingProvider;
use crate::types::{EmbedRequest, EmbedResponse};

const MAX_RETRIES: u32 = 3;

/// Ollama embedding client
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaEmbedder {
    /// Create new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // whole-corpus batches can be slow
            .build()
            .map_err(|e| VecSearchError::provider(format!("Failed to create HTTP client: {}", e)))?;

        info!("Ollama embedder initialized: {} (model: {})", base_url, model);
        Ok(Self {
            base_url,
            model,
            client,
        })
    }

    /// Test connection to Ollama
    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VecSearchError::network(format!("Failed to connect to Ollama: {}", e)))?;
        Ok(response.status().is_success())
    }

    /// Embed with custom retry count
    async fn embed_with_retry(&self, texts: &[String], max_retries: u32) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        debug!(
            "Generating embeddings - Model: {}, Batch size: {}",
            self.model,
            texts.len()
        );

        let mut last_error = None;

        for attempt in 1..=max_retries {
            match self.try_embed(&url, &request).await {
                Ok(embeddings) => {
                    debug!(
                        "Received {} embeddings - Dimension: {}",
                        embeddings.len(),
                        embeddings.first().map_or(0, Vec::len)
                    );
                    return Ok(embeddings);
                }
                Err(e) => {
                    if attempt < max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt - 1));
                        warn!(
                            "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt, max_retries, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| VecSearchError::provider("All retries failed")))
    }

    /// Single attempt at a batch embedding call
    async fn try_embed(&self, url: &str, request: &EmbedRequest) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| VecSearchError::provider(format!("Failed to send embedding request: {}", e)))?
            .error_for_status()
            .map_err(|e| VecSearchError::provider(format!("Ollama embedding API error: {}", e)))?;

        let result: EmbedResponse = response.json().await.map_err(|e| {
            VecSearchError::provider(format!("Failed to parse embedding response: {}", e))
        })?;

        if result.embeddings.len() != request.input.len() {
            return Err(VecSearchError::provider(format!(
                "Ollama returned {} embeddings for {} texts",
                result.embeddings.len(),
                request.input.len()
            )));
        }

        Ok(result.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_with_retry(texts, MAX_RETRIES).await
    }

    async fn is_available(&self) -> bool {
        match self.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OllamaEmbedder::new("http://localhost:11434/", "all-minilm").unwrap();
        assert_eq!(embedder.base_url, "http://localhost:11434");
        assert_eq!(embedder.model_name(), "all-minilm");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        // Port 9 (discard) is never an Ollama server; an empty batch must not touch it.
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "all-minilm").unwrap();
        let vectors = embedder.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_provider_error() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "all-minilm").unwrap();
        let result = embedder.embed_with_retry(&["hello".to_string()], 1).await;
        assert!(matches!(result, Err(VecSearchError::Provider(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "all-minilm").unwrap();
        assert!(!embedder.is_available().await);
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbedRequest {
            model: "all-minilm".to_string(),
            input: vec!["a".to_string(), "b".to_string()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"all-minilm","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let response: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.embeddings.len(), 2);
        assert_eq!(response.embeddings[1], vec![0.3, 0.4]);
    }
}
