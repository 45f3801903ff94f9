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

use super::model::{Article, ArticlePatch, CreateArticleRequest, UpdateArticleRequest};

const RESOURCE: Resource = Resource::Articles;

#[axum::debug_handler]
pub async fn list_articles(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::List, None).await?;

    let key = state.cache.list_key(RESOURCE);
    if let Some(articles) = state.cache.get_json::<Vec<Article>>(&key).await {
        return Ok((limit, cache_header(true), success_to_api_response(articles)));
    }

    let articles = state.articles.list().await?;
    state.cache.put_json(&key, &articles).await;
    Ok((limit, cache_header(false), success_to_api_response(articles)))
}

#[axum::debug_handler]
pub async fn get_article(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Read, Some(&id.to_string()))
        .await?;
    let article = state.articles.find(id).await?;
    Ok((limit, entity_header(RESOURCE), success_to_api_response(article)))
}

#[axum::debug_handler]
pub async fn create_article(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidJson(req): ValidJson<CreateArticleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::Create, None).await?;

    let article = state.articles.create(req.into()).await?;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %article.id, title = %article.title, "Article created");

    Ok((
        StatusCode::CREATED,
        limit,
        entity_header(RESOURCE),
        message_to_api_response("Article created successfully", article),
    ))
}

#[axum::debug_handler]
pub async fn update_article(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
    ValidJson(req): ValidJson<UpdateArticleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let patch = ArticlePatch::from(req);
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    let limit = state
        .limiter
        .check(&ip, Action::Update, Some(&id.to_string()))
        .await?;

    let updated = state.articles.update(id, patch).await?;
    destroy_quietly(&state.media, updated.replaced_image.as_deref()).await;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %id, "Article updated");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response("Article updated successfully", updated.entity),
    ))
}

#[axum::debug_handler]
pub async fn delete_article(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Delete, Some(&id.to_string()))
        .await?;

    let article = state.articles.delete(id).await?;
    destroy_quietly(&state.media, article.image_public_id.as_deref()).await;
    state.cache.invalidate(&[RESOURCE]).await;
    tracing::info!(id = %id, title = %article.title, "Article deleted");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response(
            "Article deleted successfully",
            DeletedEntity {
                id: article.id,
                name: article.title,
            },
        ),
    ))
}
