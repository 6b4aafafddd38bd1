//! 相似度 DTO
//!
//! 定义相似题检索、题对枚举与试卷比较的请求和响应数据结构。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::similarity::{ComparedQuestion, SimilarMatch, SimilarPair};

/// 相似题检索请求
#[derive(Debug, Deserialize, Validate)]
pub struct SimilarQuestionsRequest {
    /// 查询题干
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    /// 限定题库
    #[serde(default)]
    pub question_bank_id: Option<String>,
    /// 相似度阈值
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub threshold: Option<f64>,
    /// 返回结果数量
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// 相似题检索响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarQuestionsResponse {
    pub query: String,
    pub results: Vec<SimilarMatch>,
    pub total_results: usize,
    /// 耗时（毫秒）
    pub took_ms: u64,
}

/// 相似题对查询参数
#[derive(Debug, Deserialize, Validate, Default)]
pub struct SimilarPairsQuery {
    pub question_bank_id: Option<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
    #[validate(range(min = 1, max = 10000))]
    pub max_pairs: Option<usize>,
}

/// 相似题对响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarPairsResponse {
    pub pairs: Vec<SimilarPair>,
    pub total_pairs: usize,
    pub took_ms: u64,
}

/// 试卷比较请求
#[derive(Debug, Deserialize, Validate)]
pub struct CompareTestsRequest {
    #[serde(default)]
    pub test1_questions: Vec<ComparedQuestion>,
    #[serde(default)]
    pub test2_questions: Vec<ComparedQuestion>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub threshold: Option<f64>,
}
