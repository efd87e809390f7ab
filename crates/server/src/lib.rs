//! vecsearch HTTP server
//!
//! Actix-web surface over the index lifecycle: health, build, search and
//! snapshot load.

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use vecsearch_common::{AppConfig, Result, VecSearchError};
use vecsearch_embed::EmbeddingProvider;

pub use error::ApiError;
pub use state::AppState;

/// Register every route plus the JSON body error handler
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(routes::health::health)
        .service(routes::index::build_index)
        .service(routes::index::load_index)
        .service(routes::search::search);
}

/// Malformed bodies become `ValidationError` responses
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ApiError(VecSearchError::validation(format!("Invalid request body: {}", err))).into()
    })
}

/// Restore the index snapshot and serve until shutdown
pub async fn start_server(config: AppConfig) -> Result<()> {
    config.ensure_directories()?;
    let bind_addr = config.server_bind_address();

    let provider = vecsearch_embed::provider_from_config(&config)?;
    if !provider.is_available().await {
        warn!(
            "Embedding provider for {} is not reachable, builds fail until it is",
            provider.model_name()
        );
    }

    let state = Arc::new(AppState::new(config, provider));
    let initial = state.index.startup().await;
    info!("Index state at startup: {}", initial);

    info!("Starting vecsearch server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
