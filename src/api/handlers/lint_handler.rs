use axum::{Json, response::IntoResponse};
use validator::Validate;

use crate::{
    api::dto::lint_dto::{ValidateQuestionsRequest, ValidateQuestionsResponse},
    error::AppError,
    services::mcq_lint::lint_mcq_batch,
};

pub async fn validate_questions(
    Json(request): Json<ValidateQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let results = lint_mcq_batch(&request.questions);
    let valid_count = results.iter().filter(|r| r.validation.is_valid).count();

    Ok(Json(ValidateQuestionsResponse {
        total: results.len(),
        valid_count,
        results,
    }))
}
