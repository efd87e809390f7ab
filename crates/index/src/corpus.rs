use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;
use vecsearch_common::{Result, VecSearchError};

use crate::types::Record;

/// Source of reference records
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Every record, in store order
    async fn fetch_all(&self) -> Result<Vec<Record>>;

    /// Up to `limit` records whose sector contains `sector`, case-insensitive.
    /// An empty `sector` matches every record.
    async fn find_by_sector(&self, sector: &str, limit: usize) -> Result<Vec<Record>> {
        let needle = sector.to_lowercase();
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .filter(|r| needle.is_empty() || r.sector.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }
}

/// Corpus read from a JSON array of records on disk.
///
/// The file is re-read on every call so an external writer can refresh the
/// corpus between builds.
#[derive(Debug, Clone)]
pub struct JsonCorpusStore {
    path: PathBuf,
}

impl JsonCorpusStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CorpusStore for JsonCorpusStore {
    async fn fetch_all(&self) -> Result<Vec<Record>> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            VecSearchError::corpus(format!(
                "Failed to read corpus {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let records: Vec<Record> = serde_json::from_str(&data).map_err(|e| {
            VecSearchError::corpus(format!(
                "Failed to parse corpus {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// In-memory corpus, replaceable at runtime
#[derive(Debug, Default)]
pub struct MemoryCorpusStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryCorpusStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Swap the whole corpus
    pub fn replace(&self, records: Vec<Record>) {
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        *guard = records;
    }
}

#[async_trait]
impl CorpusStore for MemoryCorpusStore {
    async fn fetch_all(&self) -> Result<Vec<Record>> {
        let guard = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }
}
