pub mod application;
pub mod article;
pub mod auth;
pub mod dashboard;
pub mod media;
pub mod order;
pub mod platform;


use axum::response::IntoResponse;
use serde_json::json;

use crate::result::success_to_api_response;

pub async fn health() -> impl IntoResponse {
    success_to_api_response(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
