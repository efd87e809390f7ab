use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use vecsearch_common::{Result, VecSearchError};

use crate::vector_index::VectorIndex;

fn default_stage() -> String {
    "unicorn".to_string()
}

/// Identifier forms found in corpus exports
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreId {
    Text(String),
    Integer(i64),
    /// Extended JSON object id, `{"$oid": "..."}`
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

fn store_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StoreId>::deserialize(deserializer)?.map(|id| match id {
        StoreId::Text(id) | StoreId::ObjectId { oid: id } => id,
        StoreId::Integer(n) => n.to_string(),
    }))
}

/// Reference record as held by the corpus store.
///
/// Field aliases accept exports of the Spanish-keyed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store identifier, if the store has one
    #[serde(
        default,
        alias = "_id",
        deserialize_with = "store_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(default, alias = "nombre")]
    pub name: String,

    #[serde(default)]
    pub sector: String,

    #[serde(default, alias = "pais")]
    pub country: String,

    /// Valuation in USD
    #[serde(default, alias = "valoracion")]
    pub valuation: f64,

    #[serde(default = "default_stage", alias = "etapa")]
    pub stage: String,

    #[serde(default, alias = "descripcion")]
    pub description: String,
}

/// Metadata copied from a record at build time, parallel to the vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Store id, or the corpus position when the store has none
    pub id: String,
    pub name: String,
    pub sector: String,
    pub country: String,
    pub valuation: f64,
    pub stage: String,
    pub description: String,
}

impl MetadataEntry {
    pub fn from_record(position: usize, record: &Record) -> Self {
        Self {
            id: record
                .id
                .clone()
                .unwrap_or_else(|| position.to_string()),
            name: record.name.clone(),
            sector: record.sector.clone(),
            country: record.country.clone(),
            valuation: record.valuation,
            stage: record.stage.clone(),
            description: record.description.clone(),
        }
    }
}

/// A complete, immutable index: the unit that gets published, saved and loaded
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    /// Unit-normalized vectors
    pub index: VectorIndex,

    /// Metadata, position `i` describes vector `i`
    pub metadata: Vec<MetadataEntry>,

    /// Vectors as returned by the provider, before normalization
    pub raw_embeddings: Vec<Vec<f32>>,

    /// Embedding model used
    pub embedding_model: String,

    /// When the vectors were produced
    pub created_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Assemble a snapshot, enforcing the parallel-length invariant
    pub fn new(
        index: VectorIndex,
        metadata: Vec<MetadataEntry>,
        raw_embeddings: Vec<Vec<f32>>,
        embedding_model: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if index.len() != metadata.len() || raw_embeddings.len() != metadata.len() {
            return Err(VecSearchError::internal(format!(
                "Index parts disagree: {} vectors, {} metadata entries, {} raw embeddings",
                index.len(),
                metadata.len(),
                raw_embeddings.len()
            )));
        }
        Ok(Self {
            index,
            metadata,
            raw_embeddings,
            embedding_model: embedding_model.into(),
            created_at,
        })
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Embedding dimension
    pub fn dim(&self) -> usize {
        self.index.dim()
    }
}

/// Search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Insertion position in the index
    pub position: usize,

    /// Cosine similarity in [-1, 1]
    pub score: f32,

    /// Metadata
    pub metadata: MetadataEntry,
}

/// Wire shape of one "similar record", shared by the search API and the
/// caller-side sector fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarRecord {
    pub name: String,
    pub sector: String,
    pub country: String,
    pub valuation: f64,
    pub stage: String,
    pub description: String,
    pub similarity: f32,
}

impl SimilarRecord {
    pub fn from_result(result: &SearchResult) -> Self {
        let m = &result.metadata;
        Self {
            name: m.name.clone(),
            sector: m.sector.clone(),
            country: m.country.clone(),
            valuation: m.valuation,
            stage: m.stage.clone(),
            description: m.description.clone(),
            similarity: result.score,
        }
    }

    /// Record tagged with a fixed similarity (not a cosine score)
    pub fn from_record(record: &Record, similarity: f32) -> Self {
        Self {
            name: record.name.clone(),
            sector: record.sector.clone(),
            country: record.country.clone(),
            valuation: record.valuation,
            stage: record.stage.clone(),
            description: record.description.clone(),
            similarity,
        }
    }
}
