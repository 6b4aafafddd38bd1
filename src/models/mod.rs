//! 核心数据模型模块
//!
//! 定义题目统计、试卷、作答结果与作答矩阵。

pub mod question;
pub mod response_matrix;
pub mod test;

pub use question::{
    ClassicalParameters, IrtParameters, Question, QuestionStatistics, ScaledParameters, round_to,
};
pub use response_matrix::ResponseMatrix;
pub use test::{Test, TestQuestion, TestResult};
