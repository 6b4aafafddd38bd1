//! API 模块
//!
//! 提供 REST API 支持。

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use crate::api::app_state::AppState;
use crate::observability::metrics_middleware;
use axum::{Router, extract::DefaultBodyLimit};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub fn create_router(app_state: AppState) -> Router {
    let max_upload = app_state.config.server.max_upload_bytes;
    let metrics = app_state.metrics.clone();

    let api = Router::new()
        .merge(routes::calibration_routes::create_calibration_router())
        .merge(routes::similarity_routes::create_similarity_router())
        .merge(routes::lint_routes::create_lint_router());

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
