//! DTO 模块
//!
//! 数据传输对象，用于 API 请求和响应的序列化。

pub mod calibration_dto;
pub mod lint_dto;
pub mod similarity_dto;

pub use calibration_dto::*;
pub use lint_dto::*;
pub use similarity_dto::*;
