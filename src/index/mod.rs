//! 索引模块
//!
//! [`EmbeddingIndex`] 组合嵌入模型与平坦 L2 索引，是一次相似度计算内部的工作状态：
//! 每个请求自行构建，范围变化时整体重建，不做增量同步。

pub mod embedding;
pub mod vector;

pub use embedding::{
    EmbeddingModel, HashingEmbeddingModel, OllamaEmbeddingModel, create_embedding_model,
};
pub use vector::{FlatL2Index, Neighbor, VectorIndex, cosine_similarity, euclidean_distance};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::round_to;
use crate::storage::repository::QuestionRepository;

/// 默认距离归一化尺度
pub const DEFAULT_DISTANCE_SCALE: f32 = 10.0;

/// 待索引条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub id: String,
    pub text: String,
}

impl IndexItem {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
        }
    }
}

/// 检索命中
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub distance: f32,
    /// 1 - min(distance / scale, 1)，保留 4 位小数
    pub similarity: f64,
}

/// L2 距离换算为 [0, 1] 相似度
pub fn distance_to_similarity(distance: f32, scale: f32) -> f64 {
    let scale = if scale > 0.0 { scale } else { DEFAULT_DISTANCE_SCALE };
    let ratio = (distance as f64 / scale as f64).min(1.0);
    round_to(1.0 - ratio.max(0.0), 4)
}

pub struct EmbeddingIndex {
    model: Arc<dyn EmbeddingModel>,
    index: FlatL2Index,
    items: Vec<IndexItem>,
    distance_scale: f32,
}

impl EmbeddingIndex {
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        let dimension = model.dimension();
        Self {
            model,
            index: FlatL2Index::new(dimension),
            items: Vec::new(),
            distance_scale: DEFAULT_DISTANCE_SCALE,
        }
    }

    pub fn with_distance_scale(mut self, scale: f32) -> Self {
        self.distance_scale = scale;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[IndexItem] {
        &self.items
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn reset(&mut self) {
        self.index.reset();
        self.items.clear();
    }

    /// 计算单条文本的嵌入
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.model.encode(text).await
    }

    /// 批量计算嵌入
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.model.encode_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Model {} returned {} vectors for {} texts",
                self.model.name(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    /// 追加条目，空列表不做任何事
    pub async fn add(&mut self, items: Vec<IndexItem>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let texts: Vec<&str> = items.iter().map(|item| item.text.as_str()).collect();
        let vectors = self.embed_batch(&texts).await?;
        self.index.add(&vectors)?;
        self.items.extend(items);
        Ok(())
    }

    /// 重置后索引指定题库（None 为全部题目）中的题目，返回索引条数
    pub async fn build_from_source(
        &mut self,
        source: &dyn QuestionRepository,
        question_bank_id: Option<&str>,
    ) -> Result<usize> {
        self.reset();
        let items: Vec<IndexItem> = source
            .list(question_bank_id)
            .await?
            .into_iter()
            .map(|q| IndexItem {
                id: q.id,
                text: q.question_text,
            })
            .collect();
        self.add(items).await?;
        debug!(
            "Built embedding index with {} questions (scope: {})",
            self.len(),
            question_bank_id.unwrap_or("all")
        );
        Ok(self.len())
    }

    /// 检索与查询文本最近的至多 top_k 个条目
    pub async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embed(query_text).await?;
        self.search_vector(&query, top_k)
    }

    /// 以已索引条目自身的向量检索
    pub fn search_position(&self, position: usize, top_k: usize) -> Result<Vec<SearchHit>> {
        let query = self
            .index
            .vector(position)
            .ok_or_else(|| AppError::VectorIndex(format!("No indexed item at {}", position)))?
            .to_vec();
        self.search_vector(&query, top_k)
    }

    fn search_vector(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let neighbors = self.index.search(query, top_k)?;
        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                self.items.get(n.position).map(|item| SearchHit {
                    id: item.id.clone(),
                    text: item.text.clone(),
                    distance: n.distance,
                    similarity: distance_to_similarity(n.distance, self.distance_scale),
                })
            })
            .collect())
    }
}
