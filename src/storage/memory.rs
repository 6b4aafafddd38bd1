//! 内存仓储实现

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Question, QuestionStatistics, Test, TestResult};
use crate::storage::repository::{QuestionRepository, TestRepository, TestResultRepository};

/// 题目内存仓储，列表按创建顺序返回
#[derive(Default)]
pub struct MemoryQuestionRepository {
    questions: DashMap<String, (u64, Question)>,
    sequence: AtomicU64,
    batch_lock: Mutex<()>,
}

impl MemoryQuestionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionRepository for MemoryQuestionRepository {
    async fn create(&self, question: Question) -> Result<Question> {
        let _guard = self.batch_lock.lock();
        if self.questions.contains_key(&question.id) {
            return Err(AppError::Validation(format!(
                "Question {} already exists",
                question.id
            )));
        }
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.questions
            .insert(question.id.clone(), (seq, question.clone()));
        Ok(question)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Question>> {
        Ok(self.questions.get(id).map(|entry| entry.value().1.clone()))
    }

    async fn list(&self, question_bank_id: Option<&str>) -> Result<Vec<Question>> {
        let mut questions: Vec<(u64, Question)> = self
            .questions
            .iter()
            .filter(|entry| {
                question_bank_id.is_none_or(|bank| entry.value().1.question_bank_id == bank)
            })
            .map(|entry| entry.value().clone())
            .collect();
        questions.sort_by_key(|(seq, _)| *seq);
        Ok(questions.into_iter().map(|(_, q)| q).collect())
    }

    async fn update_statistics_batch(
        &self,
        updates: Vec<(String, QuestionStatistics)>,
    ) -> Result<usize> {
        let _guard = self.batch_lock.lock();

        if let Some((missing, _)) = updates
            .iter()
            .find(|(id, _)| !self.questions.contains_key(id))
        {
            return Err(AppError::NotFound(format!("Question {}", missing)));
        }

        let count = updates.len();
        for (id, statistics) in updates {
            if let Some(mut entry) = self.questions.get_mut(&id) {
                entry.value_mut().1.statistics = Some(statistics);
            }
        }
        Ok(count)
    }
}

/// 试卷内存仓储
#[derive(Default)]
pub struct MemoryTestRepository {
    tests: DashMap<String, Test>,
}

impl MemoryTestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestRepository for MemoryTestRepository {
    async fn create(&self, test: Test) -> Result<Test> {
        if self.tests.contains_key(&test.id) {
            return Err(AppError::Validation(format!("Test {} already exists", test.id)));
        }
        self.tests.insert(test.id.clone(), test.clone());
        Ok(test)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Test>> {
        Ok(self.tests.get(id).map(|entry| entry.value().clone()))
    }
}

/// 作答结果内存仓储
#[derive(Default)]
pub struct MemoryTestResultRepository {
    results: Mutex<Vec<TestResult>>,
}

impl MemoryTestResultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestResultRepository for MemoryTestResultRepository {
    async fn insert_batch(&self, results: Vec<TestResult>) -> Result<usize> {
        let mut stored = self.results.lock();

        let mut keys: HashSet<(String, String)> = stored
            .iter()
            .map(|r| (r.test_id.clone(), r.student_id.clone()))
            .collect();
        for result in &results {
            if !keys.insert((result.test_id.clone(), result.student_id.clone())) {
                return Err(AppError::Validation(format!(
                    "Duplicate result for student {} in test {}",
                    result.student_id, result.test_id
                )));
            }
        }

        let count = results.len();
        stored.extend(results);
        Ok(count)
    }

    async fn list_by_test(&self, test_id: &str) -> Result<Vec<TestResult>> {
        Ok(self
            .results
            .lock()
            .iter()
            .filter(|r| r.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn count_by_test(&self, test_id: &str) -> Result<u64> {
        Ok(self
            .results
            .lock()
            .iter()
            .filter(|r| r.test_id == test_id)
            .count() as u64)
    }
}
