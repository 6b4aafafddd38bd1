// Integration tests for SimilarityService over the hashing embedding backend

use std::sync::Arc;

use mcq_analytics::config::SimilarityConfig;
use mcq_analytics::index::HashingEmbeddingModel;
use mcq_analytics::models::Question;
use mcq_analytics::services::SimilarityService;
use mcq_analytics::services::similarity::ComparedQuestion;
use mcq_analytics::storage::memory::MemoryQuestionRepository;
use mcq_analytics::storage::repository::QuestionRepository;

async fn service() -> SimilarityService {
    let questions = Arc::new(MemoryQuestionRepository::new());
    let bank = [
        ("bio-1", "biology", "What organelle produces energy in the cell?"),
        ("bio-2", "biology", "What organelle produces energy in a cell?"),
        ("bio-3", "biology", "Which blood cells carry oxygen?"),
        ("geo-1", "geography", "What is the capital city of Australia?"),
        ("geo-2", "geography", "What is the longest river in Africa?"),
    ];
    for (id, bank_id, text) in bank {
        questions
            .create(Question::new(id, bank_id, text))
            .await
            .unwrap();
    }

    SimilarityService::new(
        Arc::new(HashingEmbeddingModel::new(256)),
        questions,
        SimilarityConfig::default(),
    )
}

#[tokio::test]
async fn test_near_duplicate_ranks_first() {
    let service = service().await;
    let matches = service
        .similar_questions(
            "What organelle produces energy in the cell?",
            Some("biology"),
            Some(0.0),
            Some(3),
        )
        .await
        .unwrap();

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].question_id, "bio-1");
    assert_eq!(matches[0].similarity, 1.0);
    assert_eq!(matches[1].question_id, "bio-2");
    assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn test_bank_scope_limits_candidates() {
    let service = service().await;
    let matches = service
        .similar_questions("capital city", Some("geography"), Some(0.0), Some(10))
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m.question_id.starts_with("geo")));
}

#[tokio::test]
async fn test_pairs_are_unique_and_sorted() {
    let service = service().await;
    let pairs = service
        .similar_pairs(None, Some(0.0), Some(100))
        .await
        .unwrap();

    // 5 道题最多 10 个无序题对
    assert_eq!(pairs.len(), 10);
    let mut keys: Vec<(String, String)> = pairs
        .iter()
        .map(|p| {
            let (a, b) = (p.question1_id.clone(), p.question2_id.clone());
            if a < b { (a, b) } else { (b, a) }
        })
        .collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 10);
    assert!(pairs.windows(2).all(|w| w[0].similarity >= w[1].similarity));

    let top = &pairs[0];
    let ids = [top.question1_id.as_str(), top.question2_id.as_str()];
    assert!(ids.contains(&"bio-1") && ids.contains(&"bio-2"));
}

#[tokio::test]
async fn test_compare_identical_tests() {
    let service = service().await;
    let test = vec![
        ComparedQuestion::new(Some("x1"), "Define photosynthesis."),
        ComparedQuestion::new(Some("x2"), "Name the largest planet."),
    ];

    let report = service.compare_tests(&test, &test, Some(0.99)).await.unwrap();
    assert_eq!(report.similarity_metrics.max_similarity, 1.0);
    assert_eq!(report.similarity_metrics.similar_question_count, 2);
    assert_eq!(report.similarity_metrics.question_coverage, 1.0);
    assert!(report.overall_similarity > 0.0 && report.overall_similarity <= 1.0);
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let service = service().await;
    assert!(
        service
            .similar_questions("   ", None, None, None)
            .await
            .is_err()
    );
}
