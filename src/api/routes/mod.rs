//! Routes 模块
//!
//! 定义 API 路由。

pub mod calibration_routes;
pub mod lint_routes;
pub mod similarity_routes;
