//! 试卷版本映射
//!
//! 映射表首列为题目在题库试卷中的序号（从 1 开始），其余每列对应一个试卷版本，
//! 单元格为该题在该版本纸面上的题号。

use std::collections::{HashMap, HashSet};

use crate::error::{AppError, Result, VersionCount};
use crate::ingest::workbook::{SheetTable, parse_integer};

/// 单个版本的映射：纸面题号 → 试卷内序号（从 0 开始）
#[derive(Debug, Clone, PartialEq)]
pub struct VersionMapping {
    pub version: String,
    targets: HashMap<u32, usize>,
}

impl VersionMapping {
    /// 由 (纸面题号, 序号) 对构建映射，重复映射视为错误
    pub fn from_pairs(version: &str, pairs: &[(u32, usize)]) -> Result<Self> {
        let mut mapping = Self {
            version: version.to_string(),
            targets: HashMap::with_capacity(pairs.len()),
        };
        let mut seen_targets = HashSet::with_capacity(pairs.len());
        for &(shuffled, canonical) in pairs {
            mapping.insert(shuffled, canonical, &mut seen_targets)?;
        }
        Ok(mapping)
    }

    fn insert(
        &mut self,
        shuffled: u32,
        canonical: usize,
        seen_targets: &mut HashSet<usize>,
    ) -> Result<()> {
        if !seen_targets.insert(canonical) || self.targets.contains_key(&shuffled) {
            return Err(AppError::DuplicateMapping {
                version: self.version.clone(),
                canonical_index: canonical,
            });
        }
        self.targets.insert(shuffled, canonical);
        Ok(())
    }

    /// 查找纸面题号对应的试卷序号
    pub fn resolve(&self, shuffled: u32) -> Option<usize> {
        self.targets.get(&shuffled).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn max_target(&self) -> Option<usize> {
        self.targets.values().copied().max()
    }
}

/// 解析映射工作表
pub fn parse_version_mappings(sheet: &SheetTable) -> Result<Vec<VersionMapping>> {
    if sheet.headers.len() < 2 {
        return Err(AppError::Validation(format!(
            "Mapping sheet '{}' needs an order column and at least one version column",
            sheet.name
        )));
    }

    let mut mappings: Vec<VersionMapping> = sheet
        .headers
        .iter()
        .enumerate()
        .skip(1)
        .map(|(col, header)| VersionMapping {
            version: if header.is_empty() {
                format!("version_{}", col)
            } else {
                header.clone()
            },
            targets: HashMap::new(),
        })
        .collect();
    let mut seen_targets: Vec<HashSet<usize>> = vec![HashSet::new(); mappings.len()];

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let Some(order_cell) = row.first() else {
            continue;
        };
        if order_cell.is_empty() {
            continue;
        }
        let order = parse_integer(order_cell)
            .filter(|o| *o >= 1)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Mapping row {} has invalid question order '{}'",
                    sheet.row_number(row_idx),
                    order_cell
                ))
            })?;
        let canonical = (order - 1) as usize;

        for (col, cell) in row.iter().enumerate().skip(1) {
            if cell.is_empty() {
                continue;
            }
            let shuffled = parse_integer(cell)
                .filter(|n| *n >= 1 && *n <= u32::MAX as i64)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "Mapping row {} column '{}' has invalid question number '{}'",
                        sheet.row_number(row_idx),
                        sheet.headers[col],
                        cell
                    ))
                })?;
            mappings[col - 1].insert(shuffled as u32, canonical, &mut seen_targets[col - 1])?;
        }
    }

    Ok(mappings)
}

/// 校验每个版本恰好覆盖试卷的全部题目
pub fn validate_mappings(mappings: &[VersionMapping], question_count: usize) -> Result<()> {
    if mappings.is_empty() {
        return Err(AppError::Validation(
            "Mapping sheet contains no exam versions".to_string(),
        ));
    }

    if mappings.iter().any(|m| m.len() != question_count) {
        return Err(AppError::MappingCountMismatch {
            expected: question_count,
            actual: mappings
                .iter()
                .map(|m| VersionCount {
                    version: m.version.clone(),
                    count: m.len(),
                })
                .collect(),
        });
    }

    // 数量一致且无重复时，只需确认没有越界序号
    for mapping in mappings {
        if let Some(max) = mapping.max_target().filter(|max| *max >= question_count) {
            return Err(AppError::Validation(format!(
                "Version {} maps to question order {} but the test has {} questions",
                mapping.version,
                max + 1,
                question_count
            )));
        }
    }

    Ok(())
}
