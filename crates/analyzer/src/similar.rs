use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vecsearch_common::{AppConfig, Result, VecSearchError};
use vecsearch_index::{CorpusStore, SimilarRecord};

use crate::types::Venture;

/// Similarity attached to sector-fallback records. Not a cosine score.
pub const FALLBACK_SIMILARITY: f32 = 0.5;

pub const DEFAULT_TOP_K: usize = 5;

/// Where a set of matches came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Ranked by the search service
    Vector,
    /// Sector substring match on the corpus store
    SectorFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMatches {
    pub source: MatchSource,
    pub records: Vec<SimilarRecord>,
}

#[derive(Debug, Serialize)]
struct SearchPayload<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    results: Vec<SimilarRecord>,
}

/// Client of the search service with a corpus fallback
pub struct SimilarFinder {
    base_url: String,
    client: Client,
    corpus: Arc<dyn CorpusStore>,
}

impl SimilarFinder {
    /// `timeout` bounds each search call; on expiry the fallback is used
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        corpus: Arc<dyn CorpusStore>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VecSearchError::network(format!("Failed to create HTTP client: {}", e)))?;

        info!("Similar finder using {} (timeout {:?})", base_url, timeout);
        Ok(Self {
            base_url,
            client,
            corpus,
        })
    }

    pub fn from_config(config: &AppConfig, corpus: Arc<dyn CorpusStore>) -> Result<Self> {
        Self::new(
            &config.vector_service_url,
            Duration::from_secs(config.search_timeout_secs),
            corpus,
        )
    }

    /// Records similar to `venture`
    pub async fn find(&self, venture: &Venture, top_k: usize) -> Result<SimilarMatches> {
        self.find_by_query(&venture.search_query(), &venture.sector, top_k)
            .await
    }

    /// Search `query`; if the service fails, match `sector` on the corpus
    pub async fn find_by_query(
        &self,
        query: &str,
        sector: &str,
        top_k: usize,
    ) -> Result<SimilarMatches> {
        match self.search_remote(query, top_k).await {
            Ok(records) => {
                info!("Search service returned {} similar records", records.len());
                Ok(SimilarMatches {
                    source: MatchSource::Vector,
                    records,
                })
            }
            Err(e) => {
                warn!("Search service unavailable ({}), matching on sector {:?}", e, sector);
                let records = self
                    .corpus
                    .find_by_sector(sector, top_k)
                    .await?
                    .iter()
                    .map(|r| SimilarRecord::from_record(r, FALLBACK_SIMILARITY))
                    .collect();
                Ok(SimilarMatches {
                    source: MatchSource::SectorFallback,
                    records,
                })
            }
        }
    }

    async fn search_remote(&self, query: &str, top_k: usize) -> Result<Vec<SimilarRecord>> {
        let url = format!("{}/search", self.base_url);
        debug!("POST {} (top_k {})", url, top_k);

        let response = self
            .client
            .post(&url)
            .json(&SearchPayload { query, top_k })
            .send()
            .await
            .map_err(|e| VecSearchError::network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(VecSearchError::network(format!(
                "Search service returned {}",
                status
            )));
        }

        let reply: SearchReply = response
            .json()
            .await
            .map_err(|e| VecSearchError::network(format!("Failed to parse response: {}", e)))?;
        Ok(reply.results)
    }
}
