use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use tracing::debug;
use validator::Validate;

use crate::{
    api::{app_state::AppState, dto::similarity_dto::*},
    error::AppError,
};

pub async fn find_similar_questions(
    State(state): State<AppState>,
    Json(request): Json<SimilarQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    debug!(
        "Similar question search in bank {:?}: {}",
        request.question_bank_id, request.question_text
    );

    let start_time = std::time::Instant::now();
    let results = state
        .similarity_service
        .similar_questions(
            &request.question_text,
            request.question_bank_id.as_deref(),
            request.threshold,
            request.top_k,
        )
        .await
        .inspect_err(|_| state.metrics.record_error())?;
    let took_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.record_similarity(took_ms);

    Ok(Json(SimilarQuestionsResponse {
        query: request.question_text,
        total_results: results.len(),
        results,
        took_ms,
    }))
}

pub async fn find_similar_pairs(
    State(state): State<AppState>,
    Query(params): Query<SimilarPairsQuery>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let start_time = std::time::Instant::now();
    let pairs = state
        .similarity_service
        .similar_pairs(
            params.question_bank_id.as_deref(),
            params.threshold,
            params.max_pairs,
        )
        .await
        .inspect_err(|_| state.metrics.record_error())?;
    let took_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.record_similarity(took_ms);

    Ok(Json(SimilarPairsResponse {
        total_pairs: pairs.len(),
        pairs,
        took_ms,
    }))
}

pub async fn compare_tests(
    State(state): State<AppState>,
    Json(request): Json<CompareTestsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let start_time = std::time::Instant::now();
    let report = state
        .similarity_service
        .compare_tests(
            &request.test1_questions,
            &request.test2_questions,
            request.threshold,
        )
        .await
        .inspect_err(|_| state.metrics.record_error())?;
    state
        .metrics
        .record_similarity(start_time.elapsed().as_millis() as u64);

    Ok(Json(report))
}
