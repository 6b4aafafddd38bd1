use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 经典测量理论参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ClassicalParameters {
    /// 通过率（答对人数 / 作答人数）
    pub p_value: f64,
    /// 作答人数
    pub total_responses: u64,
    /// 答对人数
    pub correct_responses: u64,
}

impl ClassicalParameters {
    pub fn new(correct_responses: u64, total_responses: u64) -> Self {
        let p_value = if total_responses == 0 {
            0.0
        } else {
            correct_responses as f64 / total_responses as f64
        };
        Self {
            p_value,
            total_responses,
            correct_responses,
        }
    }
}

/// IRT 参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParameters {
    /// 难度（θ 尺度）
    pub difficulty: f64,
    /// 区分度
    pub discrimination: f64,
    /// 猜测参数（仅 3PL）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guessing: Option<f64>,
}

/// 由 IRT 参数派生的 0-10 刻度指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledParameters {
    pub scaled_difficulty: f64,
    pub scaled_discrimination: f64,
    pub scaled_guessing: f64,
    pub raw_quality: f64,
    pub quality_score: f64,
    /// 计算公式说明
    pub formula: String,
}

/// 题目统计信息
///
/// 标定流程在每次上传后整体重写该结构；`extra` 保留人工编辑写入的其他字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestionStatistics {
    pub classical_parameters: ClassicalParameters,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irt_parameters: Option<IrtParameters>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaled_parameters: Option<ScaledParameters>,

    /// 拟合失败说明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub last_updated: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl QuestionStatistics {
    /// 创建新统计记录
    pub fn new(
        classical: ClassicalParameters,
        irt: Option<IrtParameters>,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            classical_parameters: ClassicalParameters {
                p_value: round_to(classical.p_value, 4),
                ..classical
            },
            irt_parameters: irt.map(|p| IrtParameters {
                difficulty: round_to(p.difficulty, 4),
                discrimination: round_to(p.discrimination, 4),
                guessing: p.guessing.map(|c| round_to(c, 4)),
            }),
            scaled_parameters: None,
            error,
            last_updated: timestamp.to_rfc3339(),
            extra: serde_json::Map::new(),
        }
    }
}

/// 题目实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// 题目唯一标识
    pub id: String,

    /// 所属题库
    pub question_bank_id: String,

    /// 题干
    pub question_text: String,

    /// 最新统计信息
    #[serde(default)]
    pub statistics: Option<QuestionStatistics>,
}

impl Question {
    /// 创建新题目
    pub fn new(id: &str, question_bank_id: &str, question_text: &str) -> Self {
        Self {
            id: id.to_string(),
            question_bank_id: question_bank_id.to_string(),
            question_text: question_text.to_string(),
            statistics: None,
        }
    }
}

/// 按小数位四舍五入
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
