use std::sync::Arc;
use vecsearch_common::AppConfig;
use vecsearch_embed::EmbeddingProvider;
use vecsearch_index::{IndexManager, JsonCorpusStore};

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Published index and its build lifecycle
    pub index: IndexManager,
}

impl AppState {
    /// Index over the configured JSON corpus and snapshot directory
    pub fn new(config: AppConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let corpus = Arc::new(JsonCorpusStore::new(&config.corpus_path));
        let index = IndexManager::new(provider, corpus, config.vector_index_path.clone());
        Self { config, index }
    }

    pub fn with_index(config: AppConfig, index: IndexManager) -> Self {
        Self { config, index }
    }
}
