//! 服务模块

pub mod calibration;
pub mod mcq_lint;
pub mod quality;
pub mod similarity;

pub use calibration::{CalibrationService, CalibrationSummary};
pub use mcq_lint::{LintReport, McqDraft, lint_mcq, lint_mcq_batch};
pub use quality::{QUALITY_FORMULA, scale_parameters, score_statistics, score_with_parameters};
pub use similarity::{SimilarityService, TestComparison};
