//! Calibration Routes
//!
//! 作答上传与 IRT 标定路由。

use axum::{Router, routing::post};

use crate::api::app_state::AppState;
use crate::api::handlers::calibration_handler::upload_results;

/// 创建标定路由器
pub fn create_calibration_router() -> Router<AppState> {
    Router::new().route("/tests/:test_id/results/upload", post(upload_results))
}
