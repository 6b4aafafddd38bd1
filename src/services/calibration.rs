//! 作答上传与 IRT 标定服务
//!
//! 流程：读取工作簿 → 解析版本映射并构建作答矩阵 → 保存作答结果 →
//! 在阻塞线程上拟合 IRT（带超时）→ 质量评分 → 批量写回题目统计信息。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::config::CalibrationConfig;
use crate::error::{AppError, Result};
use crate::ingest::{ResponseMatrixBuilder, read_upload};
use crate::irt::{CalibrationOutcome, Calibrator, FitError, IrtModel};
use crate::models::{QuestionStatistics, ResponseMatrix};
use crate::services::quality::score_with_parameters;
use crate::storage::repository::{QuestionRepository, TestRepository, TestResultRepository};

/// 上传标定结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub results_count: usize,
    pub irt_calculated: bool,
    pub model_used: IrtModel,
    /// 拟合失败说明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 未匹配任何版本而被忽略的考生行数
    pub dropped_rows: usize,
}

pub struct CalibrationService {
    questions: Arc<dyn QuestionRepository>,
    tests: Arc<dyn TestRepository>,
    results: Arc<dyn TestResultRepository>,
    calibrator: Calibrator,
    builder: ResponseMatrixBuilder,
    config: CalibrationConfig,
}

impl CalibrationService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        tests: Arc<dyn TestRepository>,
        results: Arc<dyn TestResultRepository>,
        config: CalibrationConfig,
    ) -> Self {
        Self {
            questions,
            tests,
            results,
            calibrator: Calibrator::from_config(&config),
            builder: ResponseMatrixBuilder::new(&config.item_column_prefix),
            config,
        }
    }

    /// 配置中的默认模型
    pub fn default_model(&self) -> IrtModel {
        self.config.default_model.parse().unwrap_or_default()
    }

    /// 处理一次作答上传
    pub async fn calibrate_upload(
        &self,
        test_id: &str,
        file: Vec<u8>,
        model: Option<IrtModel>,
    ) -> Result<CalibrationSummary> {
        let model = model.unwrap_or_else(|| self.default_model());
        let test = self
            .tests
            .get_by_id(test_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test {}", test_id)))?;
        let question_ids = test.ordered_question_ids();
        info!(
            "Received result upload for test {} ({} bytes, model {})",
            test_id,
            file.len(),
            model
        );

        let workbook = read_upload(
            file,
            self.config.answer_sheet_index,
            self.config.mapping_sheet_index,
        )?;
        let built = self.builder.build(
            test_id,
            question_ids.len(),
            &workbook.answers,
            &workbook.mapping,
        )?;

        // 写入前确认所有题目存在
        let mut existing = Vec::with_capacity(question_ids.len());
        for id in &question_ids {
            let question = self
                .questions
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Question {}", id)))?;
            existing.push(question);
        }

        let results_count = self.results.insert_batch(built.results).await?;

        let outcome = self.calibrate_matrix(built.matrix, model).await;
        let timestamp = Utc::now();
        let updates = existing
            .into_iter()
            .enumerate()
            .map(|(i, question)| {
                let mut statistics = QuestionStatistics::new(
                    outcome.classical[i],
                    outcome.item_parameters(i),
                    outcome.error_message(),
                    timestamp,
                );
                if let Some(previous) = question.statistics {
                    statistics.extra = previous.extra;
                }
                // 刻度指标使用未舍入的拟合值
                let scored =
                    score_with_parameters(&statistics, outcome.item_parameters(i).as_ref());
                (question.id, scored)
            })
            .collect();
        self.questions.update_statistics_batch(updates).await?;

        let summary = CalibrationSummary {
            results_count,
            irt_calculated: outcome.irt_succeeded(),
            model_used: model,
            error: outcome.error_message(),
            dropped_rows: built.dropped_rows.len(),
        };
        info!(
            "Upload for test {} stored {} results (irt_calculated: {})",
            test_id, summary.results_count, summary.irt_calculated
        );
        Ok(summary)
    }

    /// 在阻塞线程上标定，超时按拟合失败处理
    ///
    /// 超时后置位取消标志，阻塞线程上的 EM 在下一轮开始前退出。
    pub async fn calibrate_matrix(
        &self,
        matrix: ResponseMatrix,
        model: IrtModel,
    ) -> CalibrationOutcome {
        let classical = self.calibrator.classical(&matrix);
        let calibrator = self.calibrator.clone();
        let timeout_secs = self.config.fit_timeout_secs;
        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            calibrator.fit_cancellable(&matrix, model, &task_cancel)
        });
        let fit = match tokio::time::timeout(Duration::from_secs(timeout_secs), handle).await {
            Ok(Ok(fit)) => fit,
            Ok(Err(join_error)) => Err(FitError::Aborted(join_error.to_string())),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                Err(FitError::Timeout(timeout_secs))
            }
        };

        if let Err(err) = &fit {
            warn!("{} fit failed, keeping classical statistics: {}", model, err);
        }
        CalibrationOutcome::from_fit(model, classical, fit)
    }
}
