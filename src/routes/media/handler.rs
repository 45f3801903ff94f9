use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    rate_limit::Action,
    result::message_to_api_response,
    utils::{
        clean,
        extract::{ClientIp, ValidJson},
    },
};

use super::model::UploadRequest;

#[axum::debug_handler]
pub async fn upload_image(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidJson(req): ValidJson<UploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::Upload, None).await?;

    let file = req.file.unwrap_or_default();
    let folder = clean(req.folder);
    let image = state.media.upload(file.trim(), folder.as_deref()).await?;

    Ok((
        StatusCode::CREATED,
        limit,
        message_to_api_response("Image uploaded successfully", image),
    ))
}

#[axum::debug_handler]
pub async fn delete_image(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let public_id = public_id.trim_matches('/').to_string();
    if public_id.is_empty() {
        return Err(AppError::field("public_id", "Public id is required"));
    }
    let limit = state
        .limiter
        .check(&ip, Action::Delete, Some(&public_id))
        .await?;

    state.media.destroy(&public_id).await?;
    tracing::info!(public_id = %public_id, "Image deleted");

    Ok((
        limit,
        message_to_api_response("Image deleted successfully", json!({ "public_id": public_id })),
    ))
}
