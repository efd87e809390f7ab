use async_trait::async_trait;
use vecsearch_common::Result;

/// Common trait for embedding backends
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier reported by `/health` and stored in snapshots
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    ///
    /// Vector `i` corresponds to text `i`, and every vector has the same
    /// dimension for a given model configuration.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Whether the backend answers right now. Local providers always do.
    async fn is_available(&self) -> bool {
        true
    }
}
