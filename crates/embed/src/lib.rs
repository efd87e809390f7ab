//! vecsearch embedding providers
//!
//! Text batches in, dense vectors out. The index treats every provider as an
//! opaque, possibly slow batch call.

mod hashing;
mod ollama;
mod provider;
mod types;

use std::sync::Arc;
use vecsearch_common::{AppConfig, EmbeddingProviderKind, Result};

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use provider::EmbeddingProvider;
pub use types::{EmbedRequest, EmbedResponse};

/// Build the provider selected by `embedding_provider`
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_provider {
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbedder::new(
            &config.ollama_base_url,
            &config.embedding_model,
        )?),
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(config.hashing_dim)?),
    };
    tracing::info!(
        "Embedding provider ready: {:?} (model: {})",
        config.embedding_provider,
        provider.model_name()
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_config_hashing() {
        let mut config = AppConfig::default();
        config.embedding_provider = EmbeddingProviderKind::Hashing;
        config.hashing_dim = 32;
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.model_name(), "hashing-32");
    }

    #[test]
    fn test_provider_from_config_ollama() {
        let config = AppConfig::default();
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.model_name(), "all-minilm");
    }
}
