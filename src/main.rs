use mcq_analytics::api::{self, app_state::AppState};
use mcq_analytics::config::loader::ConfigLoader;
use mcq_analytics::index::{EmbeddingModel, create_embedding_model};
use mcq_analytics::observability::{
    AppMetrics, HealthCheckResult, ObservabilityState, create_observability_router, init_tracing,
};
use mcq_analytics::storage::memory::{
    MemoryQuestionRepository, MemoryTestRepository, MemoryTestResultRepository,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;

    // guard 必须存活到进程结束，否则文件日志会丢失
    let _log_guard = init_tracing(&config.logging)?;
    info!(
        "Starting {} ({} environment)...",
        config.app_name, config.environment
    );

    let embedding_model = create_embedding_model(&config.embedding)?;
    info!(
        "Embedding model initialized: {} (backend: {}, dimension: {})",
        embedding_model.name(),
        config.embedding.backend,
        embedding_model.dimension()
    );

    let metrics = Arc::new(AppMetrics::default());
    let observability_state = Arc::new(ObservabilityState::new(
        env!("CARGO_PKG_VERSION"),
        metrics.clone(),
    ));
    observability_state
        .add_health_check(check_embedding(embedding_model.as_ref()).await)
        .await;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(
        config,
        embedding_model,
        Arc::new(MemoryQuestionRepository::new()),
        Arc::new(MemoryTestRepository::new()),
        Arc::new(MemoryTestResultRepository::new()),
        metrics,
    );
    info!("Application state created");

    let router = create_observability_router(observability_state).merge(api::create_router(app_state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}

/// 启动时对嵌入后端做一次编码检查
async fn check_embedding(model: &dyn EmbeddingModel) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let outcome = model.encode("health check").await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(vector) => HealthCheckResult {
            name: "embedding".to_string(),
            healthy: true,
            message: format!("{} ({} dims)", model.name(), vector.len()),
            latency_ms,
        },
        Err(e) => {
            warn!("Embedding backend health check failed: {}", e);
            HealthCheckResult {
                name: "embedding".to_string(),
                healthy: false,
                message: e.to_string(),
                latency_ms,
            }
        }
    }
}
