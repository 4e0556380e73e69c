//! API error type and its `IntoResponse` mapping (spec §6: "Errors return
//! HTTP 4xx with a JSON object `{"error": "<message>"}`; internal failures
//! return 5xx. Circuit-breaker open -> 503.").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use xlm_db::DbError;
use xlm_pipeline::PipelineError;

use crate::resilience::CircuitBreakerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("rate limit exceeded, try again shortly")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CircuitBreakerError<PipelineError>> for ApiError {
    fn from(e: CircuitBreakerError<PipelineError>) -> Self {
        match e {
            CircuitBreakerError::Open => ApiError::CircuitOpen,
            CircuitBreakerError::Inner(inner) => ApiError::Pipeline(inner),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::NoSheetsSelected) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Canceled) => StatusCode::CONFLICT,
            ApiError::Pipeline(PipelineError::InvalidPhaseTransition(_)) => StatusCode::CONFLICT,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Db(DbError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Db(DbError::VersionConflict(_)) => StatusCode::CONFLICT,
            ApiError::Db(DbError::InvalidData(_)) => StatusCode::BAD_REQUEST,
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
