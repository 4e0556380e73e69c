//! HTTP surface for the spreadsheet-to-relational migration engine (spec §6).
//!
//! Wires the axum router, the circuit breaker/rate limiter wrapper, and the
//! shared [`AppState`] over `xlm-pipeline`'s orchestrator and `xlm-db`'s
//! repositories. The binary entrypoint lives in `main.rs`; this library
//! exists so integration tests can build a router against a test database
//! without spawning the process.

pub mod config;
pub mod error;
pub mod handlers;
pub mod resilience;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{AppState, Config};
pub use error::{ApiError, ApiResult};

/// Builds the full axum router for the spec §6 HTTP surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/migration/excel/upload", post(handlers::upload_sync))
        .route("/migration/excel/upload-async", post(handlers::upload_async))
        .route("/migration/job/:jobId/status", get(handlers::job_status))
        .route("/migration/job/:jobId/validate", post(handlers::run_validate_phase))
        .route("/migration/job/:jobId/apply", post(handlers::run_apply_phase))
        .route("/migration/job/:jobId/reconcile", post(handlers::run_reconcile_phase))
        .route("/migration/validation/:jobId/steps", get(handlers::validation_steps))
        .route("/migration/validation/:jobId/current", get(handlers::validation_current))
        .route("/migration/validation/:jobId/summary", get(handlers::validation_summary))
        .route("/migration/validation/:jobId/report", get(handlers::validation_report))
        .route("/migration/validation/:jobId/performance", get(handlers::validation_performance))
        .route("/migration/validation/:jobId/step/:ordinal", get(handlers::validation_step))
        .route("/migration/validation/:jobId/check-timeout", post(handlers::check_timeout))
        .route("/migration/job/:jobId/errors/stats", get(handlers::errors_stats))
        .route("/migration/job/:jobId/errors/download", get(handlers::errors_download))
        .route("/migration/job/:jobId/cleanup", delete(handlers::cleanup_job))
        .route("/api/migration/multisheet/start", post(handlers::multisheet_start))
        .route("/api/migration/multisheet/:jobId/sheets", get(handlers::multisheet_sheets))
        .route("/api/migration/multisheet/:jobId/sheet/:sheetName", get(handlers::multisheet_sheet))
        .route("/api/migration/multisheet/:jobId/progress", get(handlers::multisheet_progress))
        .route("/api/migration/multisheet/:jobId/in-progress", get(handlers::multisheet_in_progress))
        .route("/api/migration/multisheet/:jobId/performance", get(handlers::multisheet_performance))
        .route("/api/migration/multisheet/:jobId/is-complete", get(handlers::multisheet_is_complete))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_without_panicking() {
        // AppState::new requires a live pool, so router construction itself
        // (route table wiring) is exercised indirectly by the server
        // integration tests; this just guards the module compiles as a lib.
        fn _assert_fn_exists(_: fn(AppState) -> Router) {}
        _assert_fn_exists(build_router);
    }
}
