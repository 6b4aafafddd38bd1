//! 经典测量理论统计

use crate::models::{ClassicalParameters, ResponseMatrix};

/// 计算每题的通过率与作答计数
///
/// 未作答按答错计，因此每题的作答人数等于矩阵行数。
pub fn classical_statistics(matrix: &ResponseMatrix) -> Vec<ClassicalParameters> {
    let total = matrix.num_students() as u64;
    (0..matrix.num_items())
        .map(|item| ClassicalParameters::new(matrix.item_correct(item), total))
        .collect()
}
