//! Lint Routes

use axum::{Router, routing::post};

use crate::api::app_state::AppState;
use crate::api::handlers::lint_handler::validate_questions;

/// 创建题目检查路由器
pub fn create_lint_router() -> Router<AppState> {
    Router::new().route("/questions/validate", post(validate_questions))
}
