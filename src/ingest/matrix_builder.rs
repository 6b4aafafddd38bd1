//! 作答矩阵构建
//!
//! 对每个考生尝试所有已知版本映射，选择能解析出最多有效作答的版本。

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::ingest::version_mapping::{VersionMapping, parse_version_mappings, validate_mappings};
use crate::ingest::workbook::SheetTable;
use crate::models::{ResponseMatrix, TestResult};

/// 考生原始作答：(纸面题号, 原始作答码)
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRow {
    /// 工作表中的行号（从 1 开始，含表头）
    pub row_number: usize,
    pub cells: Vec<(u32, String)>,
}

/// 单个版本的解析尝试
#[derive(Debug, Clone, PartialEq)]
pub struct VersionAttempt {
    pub version: String,
    pub valid_answers: usize,
}

/// 单个考生的解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResponse {
    /// 选中的版本
    pub version: String,
    pub answers: Vec<u8>,
    pub valid_answers: usize,
    /// 每个版本的尝试结果，按尝试顺序
    pub attempts: Vec<VersionAttempt>,
}

impl ResolvedResponse {
    pub fn is_usable(&self) -> bool {
        self.valid_answers > 0
    }
}

/// 构建结果
#[derive(Debug, Clone)]
pub struct BuiltMatrix {
    pub matrix: ResponseMatrix,
    /// 与矩阵行一一对应
    pub results: Vec<TestResult>,
    /// 未解析出任何作答而被丢弃的行号
    pub dropped_rows: Vec<usize>,
    /// 各版本被选中的次数
    pub version_usage: BTreeMap<String, usize>,
}

/// 作答码以字符 '1' 结尾即视为答对
pub fn is_correct_code(raw: &str) -> bool {
    raw.trim_end().ends_with('1')
}

/// 解析作答列名，如前缀 "Q" 时 "Q12" → 12
pub fn parse_item_column(header: &str, prefix: &str) -> Option<u32> {
    header
        .trim()
        .strip_prefix(prefix)
        .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .and_then(|rest| rest.parse::<u32>().ok())
}

/// 从作答工作表提取考生行，仅保留非空的作答列
///
/// 整行空白的行被跳过，行号仍按表格中的实际位置计算。
pub fn extract_student_rows(sheet: &SheetTable, prefix: &str) -> Vec<StudentRow> {
    let item_columns: Vec<(usize, u32)> = sheet
        .headers
        .iter()
        .enumerate()
        .filter_map(|(col, header)| parse_item_column(header, prefix).map(|n| (col, n)))
        .collect();

    sheet
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !SheetTable::is_blank_row(row))
        .map(|(idx, row)| StudentRow {
            row_number: sheet.row_number(idx),
            cells: item_columns
                .iter()
                .filter_map(|&(col, number)| {
                    row.get(col)
                        .filter(|value| !value.is_empty())
                        .map(|value| (number, value.clone()))
                })
                .collect(),
        })
        .collect()
}

/// 按单个版本映射计算作答向量，返回 (向量, 有效作答数)
fn apply_version(row: &StudentRow, mapping: &VersionMapping, question_count: usize) -> (Vec<u8>, usize) {
    let mut answers = vec![0u8; question_count];
    let mut valid = 0;

    for (number, raw) in &row.cells {
        if let Some(target) = mapping.resolve(*number).filter(|t| *t < question_count) {
            answers[target] = u8::from(is_correct_code(raw));
            valid += 1;
        }
    }

    (answers, valid)
}

/// 为考生选择最佳版本
///
/// 有效作答数严格更多的版本才会替换当前最佳，平局保留先尝试的版本。
pub fn resolve_student(
    row: &StudentRow,
    mappings: &[VersionMapping],
    question_count: usize,
) -> Option<ResolvedResponse> {
    let mut best: Option<(usize, Vec<u8>, usize)> = None;
    let mut attempts = Vec::with_capacity(mappings.len());

    for (idx, mapping) in mappings.iter().enumerate() {
        let (answers, valid) = apply_version(row, mapping, question_count);
        attempts.push(VersionAttempt {
            version: mapping.version.clone(),
            valid_answers: valid,
        });
        if best.as_ref().is_none_or(|(_, _, best_valid)| valid > *best_valid) {
            best = Some((idx, answers, valid));
        }
    }

    best.map(|(idx, answers, valid_answers)| ResolvedResponse {
        version: mappings[idx].version.clone(),
        answers,
        valid_answers,
        attempts,
    })
}

/// 作答矩阵构建器
#[derive(Debug, Clone)]
pub struct ResponseMatrixBuilder {
    item_column_prefix: String,
}

impl ResponseMatrixBuilder {
    pub fn new(item_column_prefix: &str) -> Self {
        Self {
            item_column_prefix: item_column_prefix.to_string(),
        }
    }

    /// 由作答表和映射表构建作答矩阵及对应的作答结果
    ///
    /// 校验失败时不产生任何作答结果。
    pub fn build(
        &self,
        test_id: &str,
        question_count: usize,
        answers: &SheetTable,
        mapping: &SheetTable,
    ) -> Result<BuiltMatrix> {
        if question_count == 0 {
            return Err(AppError::Validation(format!(
                "Test {} has no questions",
                test_id
            )));
        }

        let mappings = parse_version_mappings(mapping)?;
        validate_mappings(&mappings, question_count)?;
        info!(
            "Parsed {} exam version(s) for test {} ({} questions)",
            mappings.len(),
            test_id,
            question_count
        );

        let student_rows = extract_student_rows(answers, &self.item_column_prefix);

        let mut matrix_rows = Vec::new();
        let mut results = Vec::new();
        let mut dropped_rows = Vec::new();
        let mut version_usage = BTreeMap::new();

        for row in &student_rows {
            match resolve_student(row, &mappings, question_count) {
                Some(resolved) if resolved.is_usable() => {
                    debug!(
                        "Row {} resolved with version {} ({} valid answers)",
                        row.row_number, resolved.version, resolved.valid_answers
                    );
                    *version_usage.entry(resolved.version.clone()).or_insert(0) += 1;
                    results.push(TestResult::new(
                        test_id,
                        &resolved.version,
                        resolved.answers.clone(),
                    ));
                    matrix_rows.push(resolved.answers);
                }
                _ => dropped_rows.push(row.row_number),
            }
        }

        if matrix_rows.is_empty() {
            return Err(AppError::NoUsableData(format!(
                "No student in the upload has answers that match any exam version of test {}",
                test_id
            )));
        }

        let matrix = ResponseMatrix::from_rows(matrix_rows)?;
        if matrix.num_items() != question_count {
            return Err(AppError::Validation(format!(
                "Response matrix has {} columns but test {} has {} questions",
                matrix.num_items(),
                test_id,
                question_count
            )));
        }

        info!(
            "Built response matrix {}x{} for test {} ({} row(s) dropped)",
            matrix.num_students(),
            matrix.num_items(),
            test_id,
            dropped_rows.len()
        );

        Ok(BuiltMatrix {
            matrix,
            results,
            dropped_rows,
            version_usage,
        })
    }
}
