use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::database::RepositoryError;
use crate::media::MediaError;
use crate::rate_limit::RateLimitDecision;

/// 字段名 -> 错误信息列表
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 错误分类，决定状态码和日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    BusinessRule,
    RateLimit,
    Database,
    ExternalService,
    Internal,
}

/// 关键字兜底分类表，按顺序匹配
const MESSAGE_KEYWORDS: &[(&str, ErrorCategory)] = &[
    ("rate limit", ErrorCategory::RateLimit),
    ("too many requests", ErrorCategory::RateLimit),
    ("duplicate key", ErrorCategory::Conflict),
    ("unique constraint", ErrorCategory::Conflict),
    ("already exists", ErrorCategory::Conflict),
    ("foreign key", ErrorCategory::BusinessRule),
    ("cannot delete", ErrorCategory::BusinessRule),
    ("not found", ErrorCategory::NotFound),
    ("no rows", ErrorCategory::NotFound),
    ("invalid input syntax", ErrorCategory::Validation),
    ("check constraint", ErrorCategory::Validation),
    ("is required", ErrorCategory::Validation),
    ("unauthorized", ErrorCategory::Authentication),
    ("forbidden", ErrorCategory::Authorization),
    ("connection", ErrorCategory::Database),
    ("timed out", ErrorCategory::Database),
    ("pool", ErrorCategory::Database),
    ("database", ErrorCategory::Database),
];

impl ErrorCategory {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCategory::Validation | ErrorCategory::BusinessRule => StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
            ErrorCategory::Authorization => StatusCode::FORBIDDEN,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::ExternalService => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Database | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::BusinessRule => "business_rule",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Database => "database",
            ErrorCategory::ExternalService => "external_service",
            ErrorCategory::Internal => "internal",
        }
    }

    /// 无结构化信息时按错误文本归类
    pub fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        MESSAGE_KEYWORDS
            .iter()
            .find(|(keyword, _)| message.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(ErrorCategory::Internal)
    }
}

/// 缓存与限流存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Admin privileges required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error("Too many requests, retry in {} seconds", .0.reset_in_secs)]
    RateLimited(RateLimitDecision),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    ExternalService(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 单字段校验失败
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{resource} not found"))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorCategory::Validation,
            AppError::Unauthorized | AppError::InvalidCredentials => ErrorCategory::Authentication,
            AppError::Forbidden => ErrorCategory::Authorization,
            AppError::NotFound(_) => ErrorCategory::NotFound,
            AppError::Conflict(_) => ErrorCategory::Conflict,
            AppError::BusinessRule(_) => ErrorCategory::BusinessRule,
            AppError::RateLimited(_) => ErrorCategory::RateLimit,
            AppError::Database(_) => ErrorCategory::Database,
            AppError::ExternalService(_) => ErrorCategory::ExternalService,
            AppError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 5xx 不向客户端暴露内部细节
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn from_category(category: ErrorCategory, message: String) -> Self {
        match category {
            ErrorCategory::Validation => AppError::BadRequest(message),
            ErrorCategory::NotFound => AppError::NotFound(message),
            ErrorCategory::Conflict => AppError::Conflict(message),
            ErrorCategory::BusinessRule => AppError::BusinessRule(message),
            ErrorCategory::ExternalService => AppError::ExternalService(message),
            ErrorCategory::Database => AppError::Database(message),
            _ => AppError::Internal(message),
        }
    }
}

/// 数据库错误归类：先看 SQLSTATE，再按关键字兜底
pub fn classify_sqlx(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::RowNotFound => AppError::not_found("Record"),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AppError::Database(err.to_string())
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => AppError::Conflict(match db.constraint() {
                Some(constraint) => format!("A record with the same value already exists ({constraint})"),
                None => "A record with the same value already exists".to_string(),
            }),
            Some("23503") => {
                AppError::BusinessRule("Operation blocked by dependent records".to_string())
            }
            Some("22P02") | Some("23502") | Some("23514") => {
                AppError::BadRequest(db.message().to_string())
            }
            _ => {
                let message = db.message().to_string();
                AppError::from_category(ErrorCategory::from_message(&message), message)
            }
        },
        _ => {
            let message = err.to_string();
            match ErrorCategory::from_message(&message) {
                ErrorCategory::Internal => AppError::Database(message),
                category => AppError::from_category(category, message),
            }
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(resource) => AppError::not_found(resource),
            RepositoryError::Conflict(message) => AppError::Conflict(message),
            RepositoryError::BusinessRule(message) => AppError::BusinessRule(message),
            RepositoryError::Database(e) => classify_sqlx(e),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Disabled => AppError::ExternalService(err.to_string()),
            MediaError::Rejected(message) => match ErrorCategory::from_message(&message) {
                ErrorCategory::Internal => AppError::ExternalService(message),
                category => AppError::from_category(category, message),
            },
            other => AppError::ExternalService(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("{field} is invalid ({})", e.code),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::Validation(fields)
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    success: bool,
    error: String,
    category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = category.status();

        if status.is_server_error() {
            tracing::error!(category = category.as_str(), error = %self, "Request failed");
        } else {
            tracing::warn!(category = category.as_str(), error = %self, "Request rejected");
        }

        let errors = match &self {
            AppError::Validation(fields) => Some(fields),
            _ => None,
        };
        let body = ErrorResponse {
            success: false,
            error: self.public_message(),
            category,
            errors,
        };
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited(decision) = &self {
            decision.apply(response.headers_mut());
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn keyword_fallback_classification() {
        assert_eq!(
            ErrorCategory::from_message("duplicate key value violates unique constraint"),
            ErrorCategory::Conflict
        );
        assert_eq!(
            ErrorCategory::from_message("update or delete violates foreign key constraint"),
            ErrorCategory::BusinessRule
        );
        assert_eq!(
            ErrorCategory::from_message("Application not found"),
            ErrorCategory::NotFound
        );
        assert_eq!(
            ErrorCategory::from_message("invalid input syntax for type uuid"),
            ErrorCategory::Validation
        );
        assert_eq!(
            ErrorCategory::from_message("pool timed out while waiting"),
            ErrorCategory::Database
        );
        assert_eq!(ErrorCategory::from_message("boom"), ErrorCategory::Internal);
    }

    #[test]
    fn categories_map_to_status_codes() {
        assert_eq!(AppError::field("name", "required").category().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.category().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.category().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("Order").category().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::BusinessRule("active".into()).category().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database("down".into()).category().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_is_not_found() {
        let err = classify_sqlx(sqlx::Error::RowNotFound);
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn validation_response_lists_field_errors() {
        let response = AppError::field("price_cents", "Price must be positive").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["category"], "validation");
        assert_eq!(json["errors"]["price_cents"][0], "Price must be positive");
    }

    #[tokio::test]
    async fn database_details_are_not_exposed() {
        let response = AppError::Database("relation \"secret\" does not exist".into()).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "A database error occurred");
    }
}
