//! 嵌入模型服务

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::config::EmbeddingConfig;
use crate::error::{AppError, Result};

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
    fn name(&self) -> &str;
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// 特征哈希嵌入模型
///
/// 词（小写）与字符三元组经 FNV-1a 哈希到固定维度，带符号累加后做 L2 归一化。
/// 结果只依赖输入文本，适合离线部署与测试。
pub struct HashingEmbeddingModel {
    dimension: usize,
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let slot = (h % self.dimension as u64) as usize;
        // 最高位决定符号，减少哈希碰撞带来的偏置
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign * weight;
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.accumulate(&mut vector, word, WORD_WEIGHT);

            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.accumulate(&mut vector, &gram, TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbeddingModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Ollama Embedding 模型客户端
pub struct OllamaEmbeddingModel {
    client: reqwest::Client,
    model_name: String,
    base_url: String,
    dimension: usize,
    batch_size: usize,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingModel {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ollama_timeout))
            .build()?;

        Ok(Self {
            client,
            model_name: config.model_name.clone(),
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&serde_json::json!({
                "model": self.model_name,
                "input": texts,
                "truncate": true
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "Ollama embedding failed ({}): {}",
                status, error_text
            )));
        }

        let embed_response: OllamaEmbedResponse = response.json().await?;
        if embed_response.embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                embed_response.embeddings.len(),
                texts.len()
            )));
        }
        if let Some(bad) = embed_response
            .embeddings
            .iter()
            .find(|e| e.len() != self.dimension)
        {
            return Err(AppError::Embedding(format!(
                "Ollama model {} produced dimension {}, expected {}",
                self.model_name,
                bad.len(),
                self.dimension
            )));
        }
        Ok(embed_response.embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for OllamaEmbeddingModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Ollama returned no embedding".to_string()))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.embed(chunk).await?;
            all_embeddings.extend(embeddings);
        }
        debug!(
            "Encoded {} texts with Ollama model {}",
            texts.len(),
            self.model_name
        );

        Ok(all_embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// 按配置创建嵌入模型
pub fn create_embedding_model(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    match config.backend.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbeddingModel::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbeddingModel::new(config.dimension))),
        other => Err(AppError::Config(format!(
            "Unknown embedding backend '{}', expected 'hashing' or 'ollama'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hashing_model_is_deterministic_and_normalized() {
        let model: Box<dyn EmbeddingModel> = Box::new(HashingEmbeddingModel::new(384));

        let a = model.encode("What is the capital of France?").await.unwrap();
        let b = model.encode("what is the capital of france").await.unwrap();
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_model_related_texts_score_higher() {
        let model = HashingEmbeddingModel::new(512);
        let texts = [
            "Which organ pumps blood through the body?",
            "Which organ pumps blood around the human body?",
            "Solve the quadratic equation x squared minus four",
        ];
        let vectors = model.encode_batch(&texts).await.unwrap();

        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn test_hashing_model_empty_text_is_zero_vector() {
        let model = HashingEmbeddingModel::new(16);
        let v = model.encode("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    fn ollama_config(url: &str, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            backend: "ollama".into(),
            ollama_url: url.to_string(),
            dimension,
            batch_size: 2,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ollama_model_batches_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let model = OllamaEmbeddingModel::new(&ollama_config(&server.uri(), 3)).unwrap();
        let vectors = model.encode_batch(&["a", "b", "c", "d"]).await.unwrap();

        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors[2], vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_ollama_model_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let model = OllamaEmbeddingModel::new(&ollama_config(&server.uri(), 3)).unwrap();
        assert!(matches!(
            model.encode("a").await,
            Err(AppError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_ollama_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
            .mount(&server)
            .await;

        let model = OllamaEmbeddingModel::new(&ollama_config(&server.uri(), 3)).unwrap();
        match model.encode("a").await {
            Err(AppError::Embedding(message)) => assert!(message.contains("model not found")),
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_factory_rejects_unknown_backend() {
        let config = EmbeddingConfig {
            backend: "candle".into(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedding_model(&config),
            Err(AppError::Config(_))
        ));
        let hashing = create_embedding_model(&EmbeddingConfig::default()).unwrap();
        assert_eq!(hashing.name(), "hashing");
    }
}
