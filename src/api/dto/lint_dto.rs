//! 题目检查 DTO

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::mcq_lint::{BatchLintItem, McqDraft};

/// 批量检查请求
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateQuestionsRequest {
    #[validate(length(min = 1, max = 500))]
    pub questions: Vec<McqDraft>,
}

/// 批量检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateQuestionsResponse {
    pub results: Vec<BatchLintItem>,
    pub valid_count: usize,
    pub total: usize,
}
