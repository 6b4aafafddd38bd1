use crate::config::config::AppConfig;
use crate::irt::IrtModel;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// 环境变量前缀
const ENV_PREFIX: &str = "MCQ_";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序：
    /// 1. 内置默认值
    /// 2. ./config.toml
    /// 3. 环境变量（`MCQ_SECTION__KEY`）
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: PathBuf) -> Result<AppConfig, figment::Error> {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.embedding.dimension == 0 {
            return Err(ConfigValidationError::InvalidDimension);
        }

        let thresholds = [
            ("similarity.default_threshold", config.similarity.default_threshold),
            ("similarity.pair_threshold", config.similarity.pair_threshold),
            ("similarity.compare_threshold", config.similarity.compare_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold(name.to_string()));
            }
        }

        if config.similarity.distance_scale <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold(
                "similarity.distance_scale".to_string(),
            ));
        }

        if config.calibration.quadrature_points < 5 {
            return Err(ConfigValidationError::InvalidQuadrature(
                config.calibration.quadrature_points,
            ));
        }

        if config.calibration.max_em_cycles == 0 {
            return Err(ConfigValidationError::InvalidEmCycles);
        }

        if config.calibration.default_model.parse::<IrtModel>().is_err() {
            return Err(ConfigValidationError::InvalidModel(
                config.calibration.default_model.clone(),
            ));
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("服务端口无效，必须大于 0")]
    InvalidPort,

    #[error("向量维度无效，必须大于 0")]
    InvalidDimension,

    #[error("阈值 {0} 必须位于 [0, 1] 区间")]
    InvalidThreshold(String),

    #[error("求积节点数过少: {0}（至少 5 个）")]
    InvalidQuadrature(usize),

    #[error("EM 最大迭代次数必须大于 0")]
    InvalidEmCycles,

    #[error("未知的默认 IRT 模型: {0}（支持 2PL / 3PL）")]
    InvalidModel(String),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}
