use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use tracing::{error, warn};
use vecsearch_common::VecSearchError;

use crate::types::ErrorResponse;

/// Wrapper that turns a `VecSearchError` into an HTTP response
#[derive(Debug)]
pub struct ApiError(pub VecSearchError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<VecSearchError> for ApiError {
    fn from(e: VecSearchError) -> Self {
        Self(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status.as_u16(), self.0);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self.0);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.0.kind().to_string(),
            detail: self.0.to_string(),
        })
    }
}
