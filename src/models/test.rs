use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// 试卷中的题目引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQuestion {
    pub question_id: String,
    /// 试卷内从 0 开始的连续序号
    pub order: usize,
}

/// 试卷实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: String,
    pub title: String,
    /// 按序号排列的题目
    pub questions: Vec<TestQuestion>,
}

impl Test {
    /// 按给定题目顺序创建试卷，同一题目不可重复出现
    pub fn new(id: &str, title: &str, question_ids: &[&str]) -> Result<Self> {
        let mut questions = Vec::with_capacity(question_ids.len());
        for (order, question_id) in question_ids.iter().enumerate() {
            if questions
                .iter()
                .any(|q: &TestQuestion| q.question_id == *question_id)
            {
                return Err(AppError::Validation(format!(
                    "Question {} appears twice in test {}",
                    question_id, id
                )));
            }
            questions.push(TestQuestion {
                question_id: question_id.to_string(),
                order,
            });
        }

        Ok(Self {
            id: id.to_string(),
            title: title.to_string(),
            questions,
        })
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// 按试卷顺序返回题目 ID
    pub fn ordered_question_ids(&self) -> Vec<String> {
        let mut questions = self.questions.clone();
        questions.sort_by_key(|q| q.order);
        questions.into_iter().map(|q| q.question_id).collect()
    }
}

/// 考生作答结果
///
/// `answers[i] == 1` 表示考生答对了试卷中第 i 题。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    /// 随机生成的匿名考生标识
    pub student_id: String,
    pub answers: Vec<u8>,
    /// 匹配到的试卷版本
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl TestResult {
    pub fn new(test_id: &str, version: &str, answers: Vec<u8>) -> Self {
        Self {
            test_id: test_id.to_string(),
            student_id: format!("student_{}", Uuid::new_v4()),
            answers,
            version: version.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_repeated_question() {
        let result = Test::new("t1", "Midterm", &["q1", "q2", "q1"]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_orders_are_dense_from_zero() {
        let test = Test::new("t1", "Midterm", &["q3", "q1", "q2"]).unwrap();
        let orders: Vec<usize> = test.questions.iter().map(|q| q.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(test.ordered_question_ids(), vec!["q3", "q1", "q2"]);
    }

    #[test]
    fn test_student_ids_are_unique_tokens() {
        let a = TestResult::new("t1", "A", vec![1, 0]);
        let b = TestResult::new("t1", "A", vec![1, 0]);
        assert_ne!(a.student_id, b.student_id);
    }
}
