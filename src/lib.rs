use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderName,
    routing::{get, patch, post},
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use cache::DashboardCache;
use config::Config;
use database::{
    AdminRepository, ApplicationRepository, ArticleRepository, DashboardRepository,
    OrderRepository, PlatformRepository,
};
use media::MediaStore;
use middleware::{auth_middleware, log_errors};
use crate::rate_limit::RateLimiter;

pub mod cache;
pub mod common;
pub mod config;
pub mod database;
pub mod error;
pub mod media;
pub mod middleware;
pub mod rate_limit;
pub mod result;
pub mod routes;
pub mod utils;

#[cfg(test)]
mod test_support;

/// 图片上传请求体上限（data URI 经过 base64 膨胀）
const MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub platforms: Arc<dyn PlatformRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub dashboard: Arc<dyn DashboardRepository>,
    pub admins: Arc<dyn AdminRepository>,
    pub cache: DashboardCache,
    pub limiter: RateLimiter,
    pub media: Arc<dyn MediaStore>,
}

/// 组装全部路由和中间件
pub fn build_router(state: AppState) -> Router {
    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        // 应用
        .route(
            "/applications",
            get(routes::application::list_applications)
                .post(routes::application::create_application),
        )
        .route(
            "/applications/{id}",
            get(routes::application::get_application)
                .put(routes::application::update_application)
                .delete(routes::application::delete_application),
        )
        // 文章
        .route(
            "/articles",
            get(routes::article::list_articles).post(routes::article::create_article),
        )
        .route(
            "/articles/{id}",
            get(routes::article::get_article)
                .put(routes::article::update_article)
                .delete(routes::article::delete_article),
        )
        // 支付平台
        .route(
            "/platforms",
            get(routes::platform::list_platforms).post(routes::platform::create_platform),
        )
        .route(
            "/platforms/{id}",
            get(routes::platform::get_platform)
                .put(routes::platform::update_platform)
                .delete(routes::platform::delete_platform),
        )
        // 订单
        .route("/orders", get(routes::order::list_orders))
        .route(
            "/orders/{id}",
            get(routes::order::get_order).delete(routes::order::delete_order),
        )
        .route(
            "/orders/{id}/status",
            patch(routes::order::update_order_status),
        )
        .route("/dashboard/stats", get(routes::dashboard::get_stats))
        // 图片
        .route(
            "/media/upload",
            post(routes::media::upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/media/{*public_id}",
            axum::routing::delete(routes::media::delete_image),
        )
        // 应用认证中间件，只作用于已匹配的路由
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    let base = state.config.api_base_uri.clone();
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&base, api)
    };

    // 添加日志中间件和限流中间件
    router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            middleware::rate_limit,
        ))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .with_state(state)
}
