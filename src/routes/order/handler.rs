use axum::{extract::State, response::IntoResponse};

use crate::{
    AppState,
    common::{DeletedEntity, Resource, cache_header, entity_header},
    error::AppError,
    rate_limit::Action,
    result::{message_to_api_response, success_to_api_response},
    utils::{
        clean,
        extract::{ClientIp, EntityId, ValidJson},
    },
};

use super::model::{Order, UpdateOrderStatusRequest};

const RESOURCE: Resource = Resource::Orders;

/// 订单变化会影响应用销量，两个列表一起失效
const AFFECTED: [Resource; 2] = [Resource::Orders, Resource::Applications];

#[axum::debug_handler]
pub async fn list_orders(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::List, None).await?;

    let key = state.cache.list_key(RESOURCE);
    if let Some(orders) = state.cache.get_json::<Vec<Order>>(&key).await {
        return Ok((limit, cache_header(true), success_to_api_response(orders)));
    }

    let orders = state.orders.list().await?;
    state.cache.put_json(&key, &orders).await;
    Ok((limit, cache_header(false), success_to_api_response(orders)))
}

#[axum::debug_handler]
pub async fn get_order(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Read, Some(&id.to_string()))
        .await?;
    let order = state.orders.find(id).await?;
    Ok((limit, entity_header(RESOURCE), success_to_api_response(order)))
}

#[axum::debug_handler]
pub async fn update_order_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
    ValidJson(req): ValidJson<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status = req
        .status()
        .ok_or_else(|| AppError::field("status", "Status is required"))?;
    let limit = state
        .limiter
        .check(&ip, Action::Update, Some(&id.to_string()))
        .await?;

    let order = state
        .orders
        .update_status(id, status, clean(req.transaction_reference))
        .await?;
    state.cache.invalidate(&AFFECTED).await;
    tracing::info!(id = %id, status = %order.status, "Order status updated");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response(format!("Order marked as {}", order.status), order),
    ))
}

#[axum::debug_handler]
pub async fn delete_order(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let limit = state
        .limiter
        .check(&ip, Action::Delete, Some(&id.to_string()))
        .await?;

    let order = state.orders.delete(id).await?;
    state.cache.invalidate(&AFFECTED).await;
    tracing::info!(id = %id, status = %order.status, "Order deleted");

    Ok((
        limit,
        entity_header(RESOURCE),
        message_to_api_response(
            "Order deleted successfully",
            DeletedEntity {
                id: order.id,
                name: order.label(),
            },
        ),
    ))
}
