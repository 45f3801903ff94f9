use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    common::{DeletedEntity, Resource, cache_header, entity_header},
    error::AppError,
    media::destroy_quietly,
    rate_limit::Action,
    result::{message_to_api_response, success_to_api_response},
    utils::extract::{ClientIp, EntityId, ValidJson},
};

use super::model::{Platform, PlatformPatch, CreatePlatformRequest, UpdatePlatformRequest};

const RESOURCE: Resource = Resource::Platforms;
/// 订单列表带有名称，改名后一并失效
const UPDATE_AFFECTED: [Resource; 2] = [RESOURCE, Resource::Orders];

#[axum::debug_handler]
pub async fn list_platforms(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::List, None).await?;

    let key = state.cache.list_key(RESOURCE);
    if let Some(platforms) = state.cache.get_json::<Vec<Platform>>(&key).await {
        return Ok((limit, cache_header(true), success_to_api_response(platforms)));
    }

    let platforms = state.platforms.list().await?;
    state.cache.put_json(&key, &platforms).await;
    Ok((limit, cache_header(false), success_to_api_response(platforms)))
}

#[axum::debug_handler]
pub async fn get_platform(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Read, Some(&id.to_string()))
        .await?;
    let platform = state.platforms.find(id).await?;
    Ok((limit, entity_header(RESOURCE), success_to_api_response(platform)))
}

#[axum::debug_handler]
pub async fn create_platform(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidJson(req): ValidJson<CreatePlatformRequest>,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::Create, None).await?;

    let platform = state.platforms.create(req.into()).await?;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %platform.id, name = %platform.name, "Platform created");

    Ok((
        StatusCode::CREATED,
        limit,
        entity_header(RESOURCE),
        message_to_api_response("Platform created successfully", platform),
    ))
}

#[axum::debug_handler]
pub async fn update_platform(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
    ValidJson(req): ValidJson<UpdatePlatformRequest>,
) -> Result<impl IntoResponse, AppError> {
    let patch = PlatformPatch::from(req);
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    let limit = state
        .limiter
        .check(&ip, Action::Update, Some(&id.to_string()))
        .await?;

    let updated = state.platforms.update(id, patch).await?;
    destroy_quietly(&state.media, updated.replaced_image.as_deref()).await;
    state.cache.invalidate(&UPDATE_AFFECTED).await;
    tracing::info!(id = %id, "Platform updated");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response("Platform updated successfully", updated.entity),
    ))
}

#[axum::debug_handler]
pub async fn delete_platform(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Delete, Some(&id.to_string()))
        .await?;

    let platform = state.platforms.delete(id).await?;
    destroy_quietly(&state.media, platform.image_public_id.as_deref()).await;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %id, name = %platform.name, "Platform deleted");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response(
            "Platform deleted successfully",
            DeletedEntity {
                id: platform.id,
                name: platform.name,
            },
        ),
    ))
}
