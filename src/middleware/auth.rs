use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, utils::verify_token};

/// 校验管理员会话，成功后把 Claims 放进请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string());
    // 没有 Bearer 时读取会话 Cookie
    let token = bearer.or_else(|| {
        request
            .headers()
            .typed_get::<Cookie>()
            .and_then(|cookie| cookie.get(&state.config.session_cookie).map(str::to_string))
    });

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Err(AppError::Unauthorized);
    };

    let claims = verify_token(&token, &state.config).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::Unauthorized
    })?;

    if !claims.is_admin() {
        tracing::warn!(sub = %claims.sub, role = %claims.role, "Non-admin session refused");
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
