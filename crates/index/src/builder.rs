use chrono::Utc;
use tracing::{debug, info};
use vecsearch_common::{Result, VecSearchError};
use vecsearch_embed::EmbeddingProvider;

use crate::similarity::normalized;
use crate::types::{IndexSnapshot, MetadataEntry, Record};
use crate::vector_index::VectorIndex;

/// Embedding input for a record: name, sector, description, country
pub fn composite_text(record: &Record) -> String {
    format!(
        "{} {} {} {}",
        record.name, record.sector, record.description, record.country
    )
}

/// Build a complete index from a corpus snapshot.
///
/// One provider batch call covers the whole corpus. Nothing is returned on
/// failure, so a caller that publishes only `Ok` values never exposes a
/// partial index.
pub async fn build_index(provider: &dyn EmbeddingProvider, corpus: &[Record]) -> Result<IndexSnapshot> {
    if corpus.is_empty() {
        return Err(VecSearchError::EmptyCorpus);
    }

    info!("Building vector index from {} records", corpus.len());

    let texts: Vec<String> = corpus.iter().map(composite_text).collect();
    let raw_embeddings = provider.embed(&texts).await?;

    if raw_embeddings.len() != texts.len() {
        return Err(VecSearchError::provider(format!(
            "Provider returned {} vectors for {} texts",
            raw_embeddings.len(),
            texts.len()
        )));
    }

    let dim = raw_embeddings[0].len();
    if dim == 0 {
        return Err(VecSearchError::provider("Provider returned empty vectors"));
    }
    if let Some((position, v)) = raw_embeddings
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dim)
    {
        return Err(VecSearchError::provider(format!(
            "Inconsistent embedding dimension at position {}: expected {}, got {}",
            position,
            dim,
            v.len()
        )));
    }

    let mut index = VectorIndex::new(dim);
    for raw in &raw_embeddings {
        index.add(&normalized(raw))?;
    }

    let metadata: Vec<MetadataEntry> = corpus
        .iter()
        .enumerate()
        .map(|(position, record)| MetadataEntry::from_record(position, record))
        .collect();

    debug!("Normalized {} vectors of dimension {}", index.len(), dim);

    let snapshot = IndexSnapshot::new(
        index,
        metadata,
        raw_embeddings,
        provider.model_name(),
        Utc::now(),
    )?;

    info!(
        "Index built: {} documents, dimension {}",
        snapshot.len(),
        snapshot.dim()
    );
    Ok(snapshot)
}
