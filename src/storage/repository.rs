use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Question, QuestionStatistics, Test, TestResult};

/// 题目仓储
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// 创建题目，ID 已存在时报错
    async fn create(&self, question: Question) -> Result<Question>;

    /// 根据 ID 获取题目
    async fn get_by_id(&self, id: &str) -> Result<Option<Question>>;

    /// 按创建顺序列出题目，可限定题库
    async fn list(&self, question_bank_id: Option<&str>) -> Result<Vec<Question>>;

    /// 批量覆盖题目统计信息
    ///
    /// 任一 ID 不存在时整批不生效，并以 `NotFound` 报告该 ID。
    async fn update_statistics_batch(
        &self,
        updates: Vec<(String, QuestionStatistics)>,
    ) -> Result<usize>;
}

/// 试卷仓储
#[async_trait]
pub trait TestRepository: Send + Sync {
    async fn create(&self, test: Test) -> Result<Test>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Test>>;
}

/// 作答结果仓储
#[async_trait]
pub trait TestResultRepository: Send + Sync {
    /// 批量写入作答结果，(test_id, student_id) 重复时整批不生效
    async fn insert_batch(&self, results: Vec<TestResult>) -> Result<usize>;

    async fn list_by_test(&self, test_id: &str) -> Result<Vec<TestResult>>;

    async fn count_by_test(&self, test_id: &str) -> Result<u64>;
}
