use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    rate_limit::{Action, RateLimiter},
    utils::client_ip,
};

/// 全局按 IP 限流
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    // 从连接信息获取原始IP
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());
    let ip = client_ip(req.headers(), remote_ip.as_deref());

    match limiter.check(&ip, Action::Global, None).await {
        Ok(_) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}
