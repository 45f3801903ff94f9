use axum::{
    Extension,
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{
    AppState,
    config::AdminSeed,
    database::AdminRepository,
    error::AppError,
    rate_limit::Action,
    result::{message_to_api_response, success_to_api_response},
    utils::{
        ADMIN_ROLE, Claims, expired_session_cookie, generate_token,
        extract::{ClientIp, ValidJson},
        hash_password, session_cookie, verify_password,
    },
};

use super::model::{LoginRequest, LoginResponse, SessionResponse};

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.normalized_email();
    // 按 IP + 邮箱计数，防止暴力破解单个账号
    let limit = state.limiter.check(&ip, Action::Login, Some(&email)).await?;

    let admin = state
        .admins
        .find_by_email(&email)
        .await?
        .filter(|admin| admin.is_active)
        .ok_or(AppError::InvalidCredentials)?;

    let password = req.password.unwrap_or_default();
    let hash = admin.password_hash.clone();
    // bcrypt 计算较慢，放到阻塞线程池
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("password check panicked: {e}")))?
        .map_err(|e| AppError::Internal(format!("password check failed: {e}")))?;
    if !valid {
        tracing::warn!(email = %email, ip = %ip, "Failed admin login");
        return Err(AppError::InvalidCredentials);
    }

    let (token, expires_at) = generate_token(admin.id, &admin.email, &admin.role, &state.config)
        .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))?;
    let cookie = session_cookie(
        &state.config.session_cookie,
        &token,
        state.config.jwt_expiration_secs,
    );
    tracing::info!(admin_id = %admin.id, "Admin logged in");

    Ok((
        limit,
        [(header::SET_COOKIE, cookie)],
        success_to_api_response(LoginResponse {
            admin_id: admin.id,
            email: admin.email,
            role: admin.role,
            token,
            expires_at,
        }),
    ))
}

#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::SET_COOKIE,
            expired_session_cookie(&state.config.session_cookie),
        )],
        message_to_api_response("Logged out", ()),
    )
}

#[axum::debug_handler]
pub async fn me(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    success_to_api_response(SessionResponse::from(claims))
}

/// 写入初始管理员，同邮箱账号已存在时不覆盖
pub async fn seed_admin(
    admins: &dyn AdminRepository,
    seed: &AdminSeed,
) -> Result<bool, AppError> {
    let email = seed.email.trim().to_lowercase();
    if admins.find_by_email(&email).await?.is_some() {
        tracing::debug!(email = %email, "Admin account already present");
        return Ok(false);
    }

    let password = seed.password.clone();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing panicked: {e}")))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let created = admins.create_if_absent(&email, &hash, ADMIN_ROLE).await?;
    if created {
        tracing::info!(email = %email, "Admin account created");
    }
    Ok(created)
}
