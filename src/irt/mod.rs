//! IRT 标定模块
//!
//! 在二值作答矩阵上拟合 2PL / 3PL 模型，同时计算经典测量统计量。
//! 拟合失败不会丢失经典统计量，结果以 [`CalibrationOutcome`] 显式返回。

pub mod classical;
pub mod estimator;
pub mod quadrature;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::config::CalibrationConfig;
use crate::error::AppError;
use crate::models::{ClassicalParameters, IrtParameters, ResponseMatrix};

pub use classical::classical_statistics;
pub use estimator::{FitOptions, fit_with_cancel};
pub use quadrature::Quadrature;

/// IRT 模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IrtModel {
    #[default]
    #[serde(rename = "2PL")]
    TwoPl,
    #[serde(rename = "3PL")]
    ThreePl,
}

impl IrtModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IrtModel::TwoPl => "2PL",
            IrtModel::ThreePl => "3PL",
        }
    }
}

impl fmt::Display for IrtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IrtModel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "2PL" => Ok(IrtModel::TwoPl),
            "3PL" => Ok(IrtModel::ThreePl),
            other => Err(AppError::Validation(format!(
                "Unknown IRT model '{}', expected 2PL or 3PL",
                other
            ))),
        }
    }
}

/// 拟合失败原因
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FitError {
    #[error("insufficient data for IRT fit: {0}")]
    InsufficientData(String),

    #[error("EM did not converge after {cycles} cycles (max parameter change {last_change:.2e})")]
    NonConvergence { cycles: usize, last_change: f64 },

    #[error("numerical failure during IRT fit: {0}")]
    Numerical(String),

    #[error("quadrature setup failed: {0}")]
    Quadrature(String),

    #[error("IRT fit timed out after {0} seconds")]
    Timeout(u64),

    #[error("IRT fit task failed: {0}")]
    Aborted(String),

    #[error("IRT fit cancelled after {cycles} cycles")]
    Cancelled { cycles: usize },
}

/// 拟合结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrtFit {
    pub model: IrtModel,
    /// 与矩阵列一一对应
    pub items: Vec<IrtParameters>,
    /// 边际对数似然
    pub log_likelihood: f64,
    /// EM 迭代轮数
    pub cycles: usize,
}

/// 一次标定的完整结果
///
/// 经典统计量总是存在；IRT 参数与拟合错误二者恰有其一。
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub model: IrtModel,
    pub classical: Vec<ClassicalParameters>,
    pub irt: Option<IrtFit>,
    pub fit_error: Option<FitError>,
}

impl CalibrationOutcome {
    /// 由经典统计量和拟合结果组装
    pub fn from_fit(
        model: IrtModel,
        classical: Vec<ClassicalParameters>,
        fit: std::result::Result<IrtFit, FitError>,
    ) -> Self {
        match fit {
            Ok(fit) => Self {
                model,
                classical,
                irt: Some(fit),
                fit_error: None,
            },
            Err(err) => Self {
                model,
                classical,
                irt: None,
                fit_error: Some(err),
            },
        }
    }

    pub fn irt_succeeded(&self) -> bool {
        self.irt.is_some()
    }

    /// 第 i 题的 IRT 参数
    pub fn item_parameters(&self, item: usize) -> Option<IrtParameters> {
        self.irt.as_ref().and_then(|fit| fit.items.get(item).copied())
    }

    /// 写入统计信息的错误说明
    pub fn error_message(&self) -> Option<String> {
        self.fit_error.as_ref().map(|err| err.to_string())
    }
}

/// IRT 标定器
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    options: FitOptions,
}

impl Calibrator {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::new(FitOptions {
            quadrature_points: config.quadrature_points,
            max_cycles: config.max_em_cycles,
            tolerance: config.tolerance,
            min_respondents: config.min_respondents,
            ..FitOptions::default()
        })
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// 经典统计量，与拟合是否成功无关
    pub fn classical(&self, matrix: &ResponseMatrix) -> Vec<ClassicalParameters> {
        classical_statistics(matrix)
    }

    /// 仅拟合 IRT 模型
    pub fn fit(&self, matrix: &ResponseMatrix, model: IrtModel) -> Result<IrtFit, FitError> {
        estimator::fit(matrix, model, &self.options)
    }

    /// 拟合 IRT 模型，`cancel` 置位后在下一轮 EM 前放弃
    pub fn fit_cancellable(
        &self,
        matrix: &ResponseMatrix,
        model: IrtModel,
        cancel: &AtomicBool,
    ) -> Result<IrtFit, FitError> {
        estimator::fit_with_cancel(matrix, model, &self.options, cancel)
    }

    /// 单次标定：先算经典统计量，再尝试拟合，失败时降级
    pub fn calibrate(&self, matrix: &ResponseMatrix, model: IrtModel) -> CalibrationOutcome {
        let classical = self.classical(matrix);
        let fit = self.fit(matrix, model);
        match &fit {
            Ok(fit) => info!(
                "{} calibration succeeded for {} items in {} cycles",
                model,
                fit.items.len(),
                fit.cycles
            ),
            Err(err) => warn!("{} calibration fell back to classical statistics: {}", model, err),
        }
        CalibrationOutcome::from_fit(model, classical, fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_parsing() {
        assert_eq!("2PL".parse::<IrtModel>().unwrap(), IrtModel::TwoPl);
        assert_eq!("3pl".parse::<IrtModel>().unwrap(), IrtModel::ThreePl);
        assert!("1PL".parse::<IrtModel>().is_err());
        assert_eq!(IrtModel::ThreePl.to_string(), "3PL");
        assert_eq!(
            serde_json::to_string(&IrtModel::TwoPl).unwrap(),
            "\"2PL\""
        );
    }

    #[test]
    fn test_failed_fit_keeps_classical_statistics() {
        let matrix = ResponseMatrix::from_rows(vec![vec![1, 0, 1]]).unwrap();
        let outcome = Calibrator::default().calibrate(&matrix, IrtModel::TwoPl);

        assert!(!outcome.irt_succeeded());
        assert_eq!(outcome.classical.len(), 3);
        assert_eq!(outcome.classical[0].p_value, 1.0);
        assert!(outcome.error_message().unwrap().contains("insufficient data"));
        assert!(outcome.item_parameters(0).is_none());
    }

    #[test]
    fn test_classical_independent_of_model() {
        let matrix =
            ResponseMatrix::from_rows(vec![vec![1, 0, 1], vec![1, 1, 1], vec![0, 0, 1]]).unwrap();
        let calibrator = Calibrator::default();

        let two = calibrator.calibrate(&matrix, IrtModel::TwoPl);
        let three = calibrator.calibrate(&matrix, IrtModel::ThreePl);
        assert_eq!(two.classical, three.classical);
        assert_eq!(three.model, IrtModel::ThreePl);
        assert!((two.classical[1].p_value - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_config_uses_calibration_section() {
        let config = CalibrationConfig {
            quadrature_points: 31,
            max_em_cycles: 42,
            ..CalibrationConfig::default()
        };
        let calibrator = Calibrator::from_config(&config);
        assert_eq!(calibrator.options().quadrature_points, 31);
        assert_eq!(calibrator.options().max_cycles, 42);
    }
}
