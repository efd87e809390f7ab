use actix_web::{post, web, HttpResponse};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{BuildIndexResponse, LoadIndexResponse};

/// Rebuild the index from the corpus store
#[post("/build-index")]
pub async fn build_index(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, ApiError> {
    info!("Index rebuild requested");
    let snapshot = state.index.rebuild().await?;

    Ok(HttpResponse::Ok().json(BuildIndexResponse {
        success: true,
        message: format!("Index built with {} documents", snapshot.len()),
        total_documents: snapshot.len(),
        embedding_dim: snapshot.dim(),
    }))
}

/// Replace the published index with the saved snapshot
#[post("/load-index")]
pub async fn load_index(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, ApiError> {
    info!("Index load requested");
    let snapshot = state.index.load().await?;

    Ok(HttpResponse::Ok().json(LoadIndexResponse {
        success: true,
        message: format!("Index loaded with {} documents", snapshot.len()),
        total_documents: snapshot.len(),
    }))
}
