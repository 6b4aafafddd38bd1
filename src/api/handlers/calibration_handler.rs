use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::calibration_dto::UploadQueryParams},
    error::AppError,
    irt::IrtModel,
};

/// 上传作答工作簿并标定
///
/// IRT 拟合成功返回 201；只保存了经典统计量时返回 207。
pub async fn upload_results(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Query(params): Query<UploadQueryParams>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let model = params
        .model
        .as_deref()
        .map(str::parse::<IrtModel>)
        .transpose()?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        if name.as_deref() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
            file = Some(bytes.to_vec());
        }
    }
    let file = file.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    debug!("Upload for test {}: {} bytes", test_id, file.len());

    let summary = match state
        .calibration_service
        .calibrate_upload(&test_id, file, model)
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            state.metrics.record_error();
            return Err(e);
        }
    };
    state
        .metrics
        .record_upload(summary.results_count, summary.irt_calculated);

    let status = if summary.irt_calculated {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(summary)))
}
