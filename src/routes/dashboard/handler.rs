use axum::{extract::State, response::IntoResponse};

use crate::{
    AppState,
    common::cache_header,
    error::AppError,
    rate_limit::Action,
    result::success_to_api_response,
    utils::extract::ClientIp,
};

use super::model::DashboardStats;

#[axum::debug_handler]
pub async fn get_stats(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.limiter.check(&ip, Action::Read, Some("stats")).await?;

    let key = state.cache.stats_key();
    if let Some(stats) = state.cache.get_json::<DashboardStats>(&key).await {
        return Ok((limit, cache_header(true), success_to_api_response(stats)));
    }

    let stats = state.dashboard.stats().await?;
    state.cache.put_json(&key, &stats).await;
    Ok((limit, cache_header(false), success_to_api_response(stats)))
}
