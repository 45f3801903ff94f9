pub mod extract;

use std::borrow::Cow;

use axum::http::HeaderMap;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidationError;

use crate::config::Config;

pub const ADMIN_ROLE: &str = "admin";

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // 管理员ID
    pub email: String, // 登录邮箱
    pub role: String,  // 角色
    pub exp: i64,      // 过期时间
    pub iat: i64,      // 签发时间
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

pub fn generate_token(
    admin_id: Uuid,
    email: &str,
    role: &str,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(config.jwt_expiration_secs as i64)).timestamp();

    let claims = Claims {
        sub: admin_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// 优先取反向代理头，其次连接地址
pub fn client_ip(headers: &HeaderMap, remote: Option<&str>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote)
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

/// 会话 Cookie，HttpOnly
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64) -> String {
    format!("{name}={token}; HttpOnly; Path=/; SameSite=Strict; Max-Age={max_age_secs}")
}

pub fn expired_session_cookie(name: &str) -> String {
    format!("{name}=; HttpOnly; Path=/; SameSite=Strict; Max-Age=0")
}

/// 去掉首尾空白后不能为空
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Must not be blank")));
    }
    Ok(())
}

/// 可选字符串：去空白，空串视为未提供
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_carries_role_and_expires_in_future() {
        let config = Config::default();
        let id = Uuid::new_v4();
        let (token, exp) = generate_token(id, "ops@example.com", ADMIN_ROLE, &config).unwrap();

        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert!(claims.is_admin());
        assert_eq!(claims.exp, exp);
        assert!(exp > Utc::now().timestamp());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = Config::default();
        let other = Config {
            jwt_secret: "another-secret".to_string(),
            ..Config::default()
        };
        let (token, _) = generate_token(Uuid::new_v4(), "a@b.co", ADMIN_ROLE, &other).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn client_ip_prefers_real_ip_then_forwarded_then_remote() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some("10.0.0.9")), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 198.51.100.4, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some("10.0.0.9")), "198.51.100.4");

        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_ip(&headers, Some("10.0.0.9")), "203.0.113.7");
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("battery staple", &hashed).unwrap());
    }

    #[test]
    fn blank_validator() {
        assert!(not_blank("  ").is_err());
        assert!(not_blank(" x ").is_ok());
    }

    #[test]
    fn clean_trims_and_drops_empty() {
        assert_eq!(clean(Some("  hi ".into())), Some("hi".to_string()));
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(clean(None), None);
    }
}
