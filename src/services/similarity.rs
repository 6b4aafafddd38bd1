//! 语义相似度服务
//!
//! 近重复题目检索、题库内相似题对枚举以及两份试卷之间的整体相似度。

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::config::SimilarityConfig;
use crate::error::{AppError, Result};
use crate::index::{EmbeddingIndex, EmbeddingModel, cosine_similarity};
use crate::models::round_to;
use crate::storage::repository::QuestionRepository;

/// 单条相似题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub question_id: String,
    pub question_text: String,
    pub similarity: f64,
}

/// 题库内的相似题对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub question1_id: String,
    pub question1_text: String,
    pub question2_id: String,
    pub question2_text: String,
    pub similarity: f64,
}

/// 参与试卷比较的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedQuestion {
    #[serde(default)]
    pub id: Option<String>,
    pub question_text: String,
}

impl ComparedQuestion {
    pub fn new(id: Option<&str>, question_text: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            question_text: question_text.to_string(),
        }
    }
}

/// 跨试卷相似题对，索引为题目在输入列表中的位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTestPair {
    pub test1_question_index: usize,
    pub test1_question_id: Option<String>,
    pub test1_question_text: String,
    pub test2_question_index: usize,
    pub test2_question_id: Option<String>,
    pub test2_question_text: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimilarityMetrics {
    pub max_similarity: f64,
    pub similar_question_count: usize,
    pub similar_pair_ratio: f64,
    /// 可能大于 1：同一道题可与对方多道题相似
    pub question_coverage: f64,
}

/// 试卷比较报告，任一试卷没有有效题干时所有字段为零
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TestComparison {
    pub overall_similarity: f64,
    pub similarity_metrics: SimilarityMetrics,
    pub similar_questions: Vec<CrossTestPair>,
}

fn sort_by_similarity_desc<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

/// 检索相似度不低于阈值的题目
pub async fn find_similar_questions(
    index: &EmbeddingIndex,
    query_text: &str,
    threshold: f64,
    top_k: usize,
) -> Result<Vec<SimilarMatch>> {
    let hits = index.search(query_text, top_k).await?;
    Ok(hits
        .into_iter()
        .filter(|hit| hit.similarity >= threshold)
        .map(|hit| SimilarMatch {
            question_id: hit.id,
            question_text: hit.text,
            similarity: hit.similarity,
        })
        .collect())
}

/// 枚举范围内的相似题对
///
/// 先按范围重建索引，再用每道题自身的向量检索。同一无序题对只记录一次，
/// 达到 `max_pairs` 后提前停止，结果按相似度降序。
pub async fn find_similar_pairs(
    index: &mut EmbeddingIndex,
    source: &dyn QuestionRepository,
    question_bank_id: Option<&str>,
    threshold: f64,
    max_pairs: usize,
    search_top_k: usize,
) -> Result<Vec<SimilarPair>> {
    let count = index.build_from_source(source, question_bank_id).await?;
    if count < 2 || max_pairs == 0 {
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    'outer: for position in 0..count {
        let Some(item) = index.items().get(position).cloned() else {
            break;
        };
        for hit in index.search_position(position, search_top_k)? {
            if hit.id == item.id || hit.similarity < threshold {
                continue;
            }
            let key = if item.id <= hit.id {
                (item.id.clone(), hit.id.clone())
            } else {
                (hit.id.clone(), item.id.clone())
            };
            if !seen.insert(key) {
                continue;
            }
            pairs.push(SimilarPair {
                question1_id: item.id.clone(),
                question1_text: item.text.clone(),
                question2_id: hit.id,
                question2_text: hit.text,
                similarity: hit.similarity,
            });
            if pairs.len() >= max_pairs {
                break 'outer;
            }
        }
    }

    sort_by_similarity_desc(&mut pairs, |p| p.similarity);
    debug!("Found {} similar pairs among {} questions", pairs.len(), count);
    Ok(pairs)
}

/// 两份试卷的全交叉余弦相似度
pub async fn compare_tests(
    index: &EmbeddingIndex,
    test1: &[ComparedQuestion],
    test2: &[ComparedQuestion],
    threshold: f64,
) -> Result<TestComparison> {
    let valid = |questions: &[ComparedQuestion]| -> Vec<(usize, ComparedQuestion)> {
        questions
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.question_text.trim().is_empty())
            .map(|(i, q)| (i, q.clone()))
            .collect()
    };
    let left = valid(test1);
    let right = valid(test2);
    if left.is_empty() || right.is_empty() {
        return Ok(TestComparison::default());
    }

    let left_texts: Vec<&str> = left.iter().map(|(_, q)| q.question_text.as_str()).collect();
    let right_texts: Vec<&str> = right.iter().map(|(_, q)| q.question_text.as_str()).collect();
    let left_vectors = index.embed_batch(&left_texts).await?;
    let right_vectors = index.embed_batch(&right_texts).await?;

    let mut total = 0.0;
    let mut max_similarity = f64::NEG_INFINITY;
    let mut similar = Vec::new();

    for ((i, q1), v1) in left.iter().zip(&left_vectors) {
        for ((j, q2), v2) in right.iter().zip(&right_vectors) {
            let score = cosine_similarity(v1, v2);
            total += score;
            max_similarity = max_similarity.max(score);

            let rounded = round_to(score, 4);
            if rounded >= threshold {
                similar.push(CrossTestPair {
                    test1_question_index: *i,
                    test1_question_id: q1.id.clone(),
                    test1_question_text: q1.question_text.clone(),
                    test2_question_index: *j,
                    test2_question_id: q2.id.clone(),
                    test2_question_text: q2.question_text.clone(),
                    similarity: rounded,
                });
            }
        }
    }

    sort_by_similarity_desc(&mut similar, |p| p.similarity);

    let pair_count = (left.len() * right.len()) as f64;
    let similar_count = similar.len();
    Ok(TestComparison {
        overall_similarity: round_to(total / pair_count, 4),
        similarity_metrics: SimilarityMetrics {
            max_similarity: round_to(max_similarity, 4),
            similar_question_count: similar_count,
            similar_pair_ratio: round_to(similar_count as f64 / pair_count, 4),
            question_coverage: round_to(
                similar_count as f64 / left.len().min(right.len()) as f64,
                4,
            ),
        },
        similar_questions: similar,
    })
}

/// 相似度服务：每次调用自建索引
pub struct SimilarityService {
    model: Arc<dyn EmbeddingModel>,
    questions: Arc<dyn QuestionRepository>,
    config: SimilarityConfig,
}

impl SimilarityService {
    pub fn new(
        model: Arc<dyn EmbeddingModel>,
        questions: Arc<dyn QuestionRepository>,
        config: SimilarityConfig,
    ) -> Self {
        Self {
            model,
            questions,
            config,
        }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    fn new_index(&self) -> EmbeddingIndex {
        EmbeddingIndex::new(self.model.clone()).with_distance_scale(self.config.distance_scale)
    }

    /// 在题库范围内查找与给定题干相似的题目
    pub async fn similar_questions(
        &self,
        query_text: &str,
        question_bank_id: Option<&str>,
        threshold: Option<f64>,
        top_k: Option<usize>,
    ) -> Result<Vec<SimilarMatch>> {
        if query_text.trim().is_empty() {
            return Err(AppError::Validation("question_text must not be empty".into()));
        }
        let threshold = threshold.unwrap_or(self.config.default_threshold as f64);
        let top_k = top_k.unwrap_or(self.config.default_top_k);

        let mut index = self.new_index();
        index
            .build_from_source(self.questions.as_ref(), question_bank_id)
            .await?;
        let matches = find_similar_questions(&index, query_text, threshold, top_k).await?;
        info!(
            "Similarity query over {} questions returned {} matches",
            index.len(),
            matches.len()
        );
        Ok(matches)
    }

    /// 题库内相似题对
    pub async fn similar_pairs(
        &self,
        question_bank_id: Option<&str>,
        threshold: Option<f64>,
        max_pairs: Option<usize>,
    ) -> Result<Vec<SimilarPair>> {
        let mut index = self.new_index();
        let pairs = find_similar_pairs(
            &mut index,
            self.questions.as_ref(),
            question_bank_id,
            threshold.unwrap_or(self.config.pair_threshold as f64),
            max_pairs.unwrap_or(self.config.max_pairs),
            self.config.pair_search_top_k,
        )
        .await?;
        info!(
            "Similar pair scan (scope: {}) found {} pairs",
            question_bank_id.unwrap_or("all"),
            pairs.len()
        );
        Ok(pairs)
    }

    /// 比较两份试卷
    pub async fn compare_tests(
        &self,
        test1: &[ComparedQuestion],
        test2: &[ComparedQuestion],
        threshold: Option<f64>,
    ) -> Result<TestComparison> {
        let index = self.new_index();
        let report = compare_tests(
            &index,
            test1,
            test2,
            threshold.unwrap_or(self.config.compare_threshold as f64),
        )
        .await?;
        info!(
            "Compared tests of {} and {} questions: overall {:.4}",
            test1.len(),
            test2.len(),
            report.overall_similarity
        );
        Ok(report)
    }
}
