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

use super::model::{
    Application, ApplicationPatch, CreateApplicationRequest, UpdateApplicationRequest,
};

const RESOURCE: Resource = Resource::Applications;
/// 订单列表带有名称，改名后一并失效
const UPDATE_AFFECTED: [Resource; 2] = [RESOURCE, Resource::Orders];

#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::List, None).await?;

    let key = state.cache.list_key(RESOURCE);
    if let Some(applications) = state.cache.get_json::<Vec<Application>>(&key).await {
        return Ok((limit, cache_header(true), success_to_api_response(applications)));
    }

    let applications = state.applications.list().await?;
    state.cache.put_json(&key, &applications).await;
    Ok((limit, cache_header(false), success_to_api_response(applications)))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Read, Some(&id.to_string()))
        .await?;
    let application = state.applications.find(id).await?;
    Ok((limit, entity_header(RESOURCE), success_to_api_response(application)))
}

#[axum::debug_handler]
pub async fn create_application(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidJson(req): ValidJson<CreateApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::Create, None).await?;

    let application = state.applications.create(req.into()).await?;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %application.id, name = %application.name, "Application created");

    Ok((
        StatusCode::CREATED,
        limit,
        entity_header(RESOURCE),
        message_to_api_response("Application created successfully", application),
    ))
}

#[axum::debug_handler]
pub async fn update_application(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
    ValidJson(req): ValidJson<UpdateApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let patch = ApplicationPatch::from(req);
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    let limit = state
        .limiter
        .check(&ip, Action::Update, Some(&id.to_string()))
        .await?;

    let updated = state.applications.update(id, patch).await?;
    destroy_quietly(&state.media, updated.replaced_image.as_deref()).await;
    state.cache.invalidate(&UPDATE_AFFECTED).await;
    tracing::info!(id = %id, "Application updated");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response("Application updated successfully", updated.entity),
    ))
}

#[axum::debug_handler]
pub async fn delete_application(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Delete, Some(&id.to_string()))
        .await?;

    let application = state.applications.delete(id).await?;
    destroy_quietly(&state.media, application.image_public_id.as_deref()).await;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %id, name = %application.name, "Application deleted");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response(
            "Application deleted successfully",
            DeletedEntity {
                id: application.id,
                name: application.name,
            },
        ),
    ))
}
