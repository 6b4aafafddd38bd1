//! Handlers 模块
//!
//! HTTP 请求处理程序。

pub mod calibration_handler;
pub mod lint_handler;
pub mod similarity_handler;

pub use calibration_handler::*;
pub use lint_handler::*;
pub use similarity_handler::*;
