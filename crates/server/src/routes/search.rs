use actix_web::{post, web, HttpResponse};
use std::sync::Arc;
use tracing::info;
use vecsearch_index::SimilarRecord;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{SearchRequest, SearchResponse};

#[post("/search")]
pub async fn search(
    request: web::Json<SearchRequest>,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let SearchRequest { query, top_k } = request.into_inner();
    info!("Search: {:?} (top_k {})", query, top_k);

    let results: Vec<SimilarRecord> = state
        .index
        .search(&query, top_k)
        .await?
        .iter()
        .map(SimilarRecord::from_result)
        .collect();

    let total_found = results.len();
    Ok(HttpResponse::Ok().json(SearchResponse {
        query,
        results,
        total_found,
    }))
}
