//! Axum router: maps all URL paths to handlers.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    services::ServeDir,
    cors::CorsLayer,
    trace::TraceLayer,
    compression::CompressionLayer,
};
use std::sync::Arc;
use crate::state::{AppState, SharedState};
use crate::handlers::{
    dashboard::dashboard,
    data::data_selection_page,
    pipeline::{api_pipeline_status, api_run_pipeline, pipeline_config_page, processing_page},
    results::{api_brief, api_export, results_page},
};
use crate::sse::sse_handler;

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);
    build_router_shared(shared)
}

/// Same as [`build_router`] for callers that keep their own handle on the state.
pub fn build_router_shared(shared: SharedState) -> Router {
    Router::new()
        // Pages
        .route("/",                get(dashboard))
        .route("/data-selection",  get(data_selection_page))
        .route("/pipeline-config", get(pipeline_config_page))
        .route("/processing",      get(processing_page))
        .route("/results",         get(results_page))

        // SSE streaming
        .route("/api/events", get(sse_handler))

        // API endpoints
        .route("/api/run-pipeline",    post(api_run_pipeline))
        .route("/api/pipeline-status", get(api_pipeline_status))
        .route("/api/brief/{id}",      get(api_brief))
        .route("/api/export/{format}", get(api_export))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
