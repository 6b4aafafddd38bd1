use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 上传文件大小上限（字节）
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录
    pub log_dir: Option<PathBuf>,
    /// 日志文件名前缀
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            structured: false,
            log_dir: None,
            file_prefix: "mcq-analytics.log".into(),
        }
    }
}

/// 嵌入模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding 后端类型: "ollama" 或 "hashing"
    pub backend: String,
    /// 模型名称
    pub model_name: String,
    /// Ollama 服务器地址
    pub ollama_url: String,
    /// Ollama 请求超时（秒）
    pub ollama_timeout: u64,
    /// 向量维度
    pub dimension: usize,
    /// 批处理大小
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hashing".into(),
            model_name: "all-minilm".into(),
            ollama_url: "http://localhost:11434".into(),
            ollama_timeout: 60,
            dimension: 384,
            batch_size: 32,
        }
    }
}

/// 相似度检测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// 单题查重默认阈值
    pub default_threshold: f32,
    /// 单题查重默认返回数量
    pub default_top_k: usize,
    /// 题库内相似题对阈值
    pub pair_threshold: f32,
    /// 相似题对数量上限
    pub max_pairs: usize,
    /// 枚举题对时每题的近邻数
    pub pair_search_top_k: usize,
    /// 试卷对比默认阈值
    pub compare_threshold: f32,
    /// L2 距离归一化尺度
    pub distance_scale: f32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.75,
            default_top_k: 5,
            pair_threshold: 0.85,
            max_pairs: 100,
            pair_search_top_k: 10,
            compare_threshold: 0.8,
            distance_scale: 10.0,
        }
    }
}

/// 标定流程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// 默认 IRT 模型: "2PL" 或 "3PL"
    pub default_model: String,
    /// 作答列名前缀
    pub item_column_prefix: String,
    /// 作答工作表序号
    pub answer_sheet_index: usize,
    /// 版本映射工作表序号
    pub mapping_sheet_index: usize,
    /// 求积节点数
    pub quadrature_points: usize,
    /// EM 最大迭代次数
    pub max_em_cycles: usize,
    /// 收敛阈值（参数最大变化量）
    pub tolerance: f64,
    /// 拟合所需最少考生数
    pub min_respondents: usize,
    /// 拟合超时（秒）
    pub fit_timeout_secs: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            default_model: "2PL".into(),
            item_column_prefix: "Q".into(),
            answer_sheet_index: 0,
            mapping_sheet_index: 2,
            quadrature_points: 21,
            max_em_cycles: 500,
            tolerance: 1e-4,
            min_respondents: 2,
            fit_timeout_secs: 120,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 嵌入模型配置
    pub embedding: EmbeddingConfig,
    /// 相似度配置
    pub similarity: SimilarityConfig,
    /// 标定配置
    pub calibration: CalibrationConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig {
                level: "debug".into(),
                ..LoggingConfig::default()
            },
            embedding: EmbeddingConfig::default(),
            similarity: SimilarityConfig::default(),
            calibration: CalibrationConfig::default(),
            app_name: "mcq-analytics".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config.embedding.backend = "ollama".into();
        config
    }
}
