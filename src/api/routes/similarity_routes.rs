//! Similarity Routes
//!
//! 定义相似度相关的 API 路由。

use crate::api::handlers::similarity_handler::*;
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;

/// 创建相似度路由器
pub fn create_similarity_router() -> Router<AppState> {
    Router::new()
        .route("/similarity/questions", post(find_similar_questions))
        .route("/similarity/pairs", get(find_similar_pairs))
        .route("/similarity/tests/compare", post(compare_tests))
}
