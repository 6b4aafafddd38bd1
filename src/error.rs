//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个试卷版本的映射题目数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCount {
    pub version: String,
    pub count: usize,
}

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 参数验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    /// 版本映射题目数与试卷题目数不一致
    #[error("版本映射题目数不匹配: 期望 {expected} 题")]
    MappingCountMismatch {
        expected: usize,
        actual: Vec<VersionCount>,
    },

    /// 同一版本内重复映射
    #[error("版本 {version} 中题目序号 {canonical_index} 被重复映射")]
    DuplicateMapping {
        version: String,
        canonical_index: usize,
    },

    /// 没有可用数据
    #[error("没有可用数据: {0}")]
    NoUsableData(String),

    /// IRT 模型拟合失败
    #[error("IRT 模型拟合失败: {0}")]
    ModelFit(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 电子表格解析错误
    #[error("电子表格解析错误: {0}")]
    Spreadsheet(String),

    /// 向量索引错误
    #[error("向量索引错误: {0}")]
    VectorIndex(String),

    /// 嵌入模型错误
    #[error("嵌入模型错误: {0}")]
    Embedding(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl AppError {
    /// 结构化详情，供错误响应使用
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::MappingCountMismatch { expected, actual } => Some(serde_json::json!({
                "expected": expected,
                "actual": actual,
            })),
            AppError::DuplicateMapping {
                version,
                canonical_index,
            } => Some(serde_json::json!({
                "version": version,
                "canonical_index": canonical_index,
            })),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Embedding(e.to_string())
    }
}

impl From<calamine::Error> for AppError {
    fn from(e: calamine::Error) -> Self {
        AppError::Spreadsheet(e.to_string())
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();
        let mut body = ErrorResponse::new(&code, &self.to_string());
        if let Some(details) = self.details() {
            body = body.with_details(details);
        }
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response()
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 详细信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    /// 添加详细信息
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// HTTP 状态码映射
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::Validation(_) => (400, "BAD_REQUEST".to_string()),
            AppError::MappingCountMismatch { .. } => (400, "MAPPING_COUNT_MISMATCH".to_string()),
            AppError::DuplicateMapping { .. } => (400, "DUPLICATE_MAPPING".to_string()),
            AppError::Spreadsheet(_) => (400, "INVALID_SPREADSHEET".to_string()),
            AppError::NotFound(_) => (404, "NOT_FOUND".to_string()),
            AppError::Timeout(_) => (408, "TIMEOUT".to_string()),
            AppError::NoUsableData(_) => (422, "NO_USABLE_DATA".to_string()),
            AppError::VectorIndex(_) => (500, "INDEX_ERROR".to_string()),
            AppError::Embedding(_) => (500, "EMBEDDING_ERROR".to_string()),
            AppError::ModelFit(_) => (500, "MODEL_FIT_ERROR".to_string()),
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;
