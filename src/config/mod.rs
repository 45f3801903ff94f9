use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::rate_limit::{Action, RateLimitRule, RateLimitRules};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// 图片服务配置（Cloudinary 兼容接口）
#[derive(Debug, Clone)]
pub struct ImageServiceConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    pub folder: String,
}

/// 启动时写入的初始管理员
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// JWT 有效期上限（小时）
const MAX_JWT_EXPIRATION_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub session_cookie: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limits: RateLimitRules,
    pub cache_ttl_secs: u64,
    pub cache_version: String,
    pub image_service: Option<ImageServiceConfig>,
    pub admin_seed: Option<AdminSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/dashboard".to_string(),
            database_max_connections: 10,
            run_migrations: false,
            redis_url: None,
            jwt_secret: "dev-secret-change-me".to_string(),
            jwt_expiration_secs: 24 * 3600,
            session_cookie: "admin_session".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            rate_limits: RateLimitRules::default(),
            cache_ttl_secs: 300,
            cache_version: "v1".to_string(),
            image_service: None,
            admin_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let jwt_expiration_secs = match optional("JWT_EXPIRATION") {
            Some(value) => parse_expiration("JWT_EXPIRATION", &value)?,
            None => defaults.jwt_expiration_secs,
        };

        let mut rate_limits = RateLimitRules::default();
        rate_limits.global = RateLimitRule::new(
            parse_or("RATE_LIMIT_REQUESTS", rate_limits.global.max_requests)?,
            Duration::from_secs(parse_or(
                "RATE_LIMIT_WINDOW",
                rate_limits.global.window.as_secs(),
            )?),
        );
        for (key, action) in [
            ("RATE_LIMIT_LIST", Action::List),
            ("RATE_LIMIT_READ", Action::Read),
            ("RATE_LIMIT_CREATE", Action::Create),
            ("RATE_LIMIT_UPDATE", Action::Update),
            ("RATE_LIMIT_DELETE", Action::Delete),
            ("RATE_LIMIT_UPLOAD", Action::Upload),
            ("RATE_LIMIT_LOGIN", Action::Login),
        ] {
            if let Some(value) = optional(key) {
                let rule = value
                    .parse::<RateLimitRule>()
                    .map_err(|_| ConfigError::Invalid { key, value })?;
                rate_limits.set(action, rule);
            }
        }

        // 图片服务三项齐全才启用
        let image_service = match (
            optional("IMAGE_CLOUD_NAME"),
            optional("IMAGE_API_KEY"),
            optional("IMAGE_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(ImageServiceConfig {
                cloud_name,
                api_key,
                api_secret,
                api_base: optional("IMAGE_API_BASE")
                    .unwrap_or_else(|| "https://api.cloudinary.com".to_string()),
                folder: optional("IMAGE_FOLDER").unwrap_or_else(|| "dashboard".to_string()),
            }),
            _ => None,
        };

        let admin_seed = match (optional("ADMIN_EMAIL"), optional("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            run_migrations: parse_or("RUN_MIGRATIONS", defaults.run_migrations)?,
            redis_url: optional("REDIS_URL"),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration_secs,
            session_cookie: optional("SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            server_host: optional("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or("SERVER_PORT", defaults.server_port)?,
            api_base_uri: normalize_base_uri(
                &optional("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            ),
            rate_limits,
            cache_ttl_secs: parse_or("CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            cache_version: optional("CACHE_VERSION").unwrap_or(defaults.cache_version),
            image_service,
            admin_seed,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// "24h" 或 "24"，换算为秒；范围 1 小时到一年
fn parse_expiration(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::Invalid {
        key,
        value: value.to_string(),
    };
    let hours = value
        .trim_end_matches('h')
        .parse::<u64>()
        .map_err(|_| invalid())?;
    if hours == 0 || hours > MAX_JWT_EXPIRATION_HOURS {
        return Err(invalid());
    }
    hours.checked_mul(3600).ok_or_else(invalid)
}

/// 统一为 "/api" 形式；根路径返回空串
fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_accepts_hour_suffix() {
        assert_eq!(parse_expiration("JWT_EXPIRATION", "24h").unwrap(), 24 * 3600);
        assert_eq!(parse_expiration("JWT_EXPIRATION", "2").unwrap(), 7200);
        assert!(parse_expiration("JWT_EXPIRATION", "soon").is_err());
    }

    #[test]
    fn expiration_out_of_range_is_rejected() {
        assert!(parse_expiration("JWT_EXPIRATION", "0h").is_err());
        assert!(parse_expiration("JWT_EXPIRATION", "8761h").is_err());
        assert!(matches!(
            parse_expiration("JWT_EXPIRATION", "18446744073709551615h"),
            Err(ConfigError::Invalid { key: "JWT_EXPIRATION", .. })
        ));
        assert_eq!(
            parse_expiration("JWT_EXPIRATION", "8760h").unwrap(),
            MAX_JWT_EXPIRATION_HOURS * 3600
        );
    }

    #[test]
    fn base_uri_is_normalized() {
        assert_eq!(normalize_base_uri("/api/"), "/api");
        assert_eq!(normalize_base_uri("admin/api"), "/admin/api");
        assert_eq!(normalize_base_uri("/"), "");
        assert_eq!(normalize_base_uri(""), "");
    }

    #[test]
    fn default_config_has_stricter_deletes_than_updates() {
        let config = Config::default();
        let delete = config.rate_limits.rule(Action::Delete);
        let update = config.rate_limits.rule(Action::Update);
        assert!(delete.max_requests < update.max_requests);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }
}
