use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// 二值作答矩阵
///
/// 行为考生，列为按试卷顺序排列的题目，元素取 0 或 1，按行优先存储。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl ResponseMatrix {
    /// 由行向量构建矩阵
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);

        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(AppError::Validation(format!(
                    "Row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            if let Some(v) = row.iter().find(|v| **v > 1) {
                return Err(AppError::Validation(format!(
                    "Row {} contains non-binary value {}",
                    i, v
                )));
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn num_students(&self) -> usize {
        self.rows
    }

    pub fn num_items(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn get(&self, student: usize, item: usize) -> u8 {
        self.data[student * self.cols + item]
    }

    pub fn row(&self, student: usize) -> &[u8] {
        &self.data[student * self.cols..(student + 1) * self.cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    /// 某题的答对人数
    pub fn item_correct(&self, item: usize) -> u64 {
        self.rows().map(|row| row[item] as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_and_access() {
        let matrix =
            ResponseMatrix::from_rows(vec![vec![1, 0, 1], vec![1, 1, 1], vec![0, 0, 1]]).unwrap();

        assert_eq!(matrix.num_students(), 3);
        assert_eq!(matrix.num_items(), 3);
        assert_eq!(matrix.get(1, 1), 1);
        assert_eq!(matrix.row(2), &[0, 0, 1]);
        assert_eq!(matrix.item_correct(2), 3);
        assert_eq!(matrix.item_correct(1), 1);
    }

    #[test]
    fn test_rejects_ragged_and_non_binary() {
        assert!(ResponseMatrix::from_rows(vec![vec![1, 0], vec![1]]).is_err());
        assert!(ResponseMatrix::from_rows(vec![vec![1, 2]]).is_err());
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = ResponseMatrix::from_rows(vec![]).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.rows().count(), 0);
    }
}
