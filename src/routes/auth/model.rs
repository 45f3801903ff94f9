use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::Claims;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        required(message = "Email is required"),
        email(message = "Email must be a valid email address")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "Password is required"),
        length(min = 1, max = 128, message = "Password must be between 1 and 128 characters")
    )]
    pub password: Option<String>,
}

impl LoginRequest {
    /// 邮箱统一小写，同时作为登录限流的资源键
    pub fn normalized_email(&self) -> String {
        self.email
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub admin_id: Uuid,
    pub email: String,
    pub role: String,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub admin_id: String,
    pub email: String,
    pub role: String,
    pub expires_at: i64,
}

impl From<Claims> for SessionResponse {
    fn from(claims: Claims) -> Self {
        Self {
            admin_id: claims.sub,
            email: claims.email,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}
