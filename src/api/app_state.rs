use crate::config::AppConfig;
use crate::error::Result;
use crate::index::{EmbeddingModel, create_embedding_model};
use crate::observability::AppMetrics;
use crate::services::calibration::CalibrationService;
use crate::services::similarity::SimilarityService;
use crate::storage::memory::{
    MemoryQuestionRepository, MemoryTestRepository, MemoryTestResultRepository,
};
use crate::storage::repository::{QuestionRepository, TestRepository, TestResultRepository};
use std::sync::Arc;

/// Application state containing all shared services
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<AppConfig>,
    pub question_repository: Arc<dyn QuestionRepository>,
    pub test_repository: Arc<dyn TestRepository>,
    pub result_repository: Arc<dyn TestResultRepository>,
    /// Upload parsing and IRT calibration
    pub calibration_service: Arc<CalibrationService>,
    /// Similarity queries, each building its own index
    pub similarity_service: Arc<SimilarityService>,
    pub metrics: Arc<AppMetrics>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("question_repository", &"Arc<dyn QuestionRepository>")
            .field("test_repository", &"Arc<dyn TestRepository>")
            .field("result_repository", &"Arc<dyn TestResultRepository>")
            .field("calibration_service", &"Arc<CalibrationService>")
            .field("similarity_service", &"Arc<SimilarityService>")
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: AppConfig,
        embedding_model: Arc<dyn EmbeddingModel>,
        question_repository: Arc<dyn QuestionRepository>,
        test_repository: Arc<dyn TestRepository>,
        result_repository: Arc<dyn TestResultRepository>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        let calibration_service = CalibrationService::new(
            question_repository.clone(),
            test_repository.clone(),
            result_repository.clone(),
            config.calibration.clone(),
        );
        let similarity_service = SimilarityService::new(
            embedding_model,
            question_repository.clone(),
            config.similarity.clone(),
        );

        Self {
            config: Arc::new(config),
            question_repository,
            test_repository,
            result_repository,
            calibration_service: Arc::new(calibration_service),
            similarity_service: Arc::new(similarity_service),
            metrics,
        }
    }

    /// State backed by in-memory repositories and the configured embedding backend
    pub fn in_memory(config: AppConfig) -> Result<Self> {
        let embedding_model = create_embedding_model(&config.embedding)?;
        Ok(Self::new(
            config,
            embedding_model,
            Arc::new(MemoryQuestionRepository::new()),
            Arc::new(MemoryTestRepository::new()),
            Arc::new(MemoryTestResultRepository::new()),
            Arc::new(AppMetrics::default()),
        ))
    }
}
