use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::HealthResponse;

/// Liveness plus index state
#[get("/health")]
pub async fn health(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let status = state.index.status().await;
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        embedding_model: status.embedding_model,
        index_status: status.state,
        indexed_documents: status.documents,
    })
}
