use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::{clean, not_blank};

/// 收款平台
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Platform {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub account_name: String,
    pub account_number: String,
    pub fee_percent: i32,
    pub is_active: bool,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Platform {
    /// 启用中或已有交易的平台不能删除
    pub fn deletion_blocker(&self, transaction_count: i64) -> Option<String> {
        if self.is_active {
            return Some("Cannot delete an active payment platform. Deactivate it first.".to_string());
        }
        if transaction_count > 0 {
            return Some(format!(
                "Cannot delete a payment platform with existing transactions ({transaction_count} recorded)"
            ));
        }
        None
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlatformRequest {
    #[validate(
        required(message = "Name is required"),
        length(min = 2, max = 80, message = "Name must be between 2 and 80 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(
        required(message = "Account name is required"),
        length(min = 1, max = 120, message = "Account name must be between 1 and 120 characters"),
        custom(function = "not_blank")
    )]
    pub account_name: Option<String>,
    #[validate(
        required(message = "Account number is required"),
        length(min = 4, max = 64, message = "Account number must be between 4 and 64 characters"),
        custom(function = "not_blank")
    )]
    pub account_number: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Fee must be between 0 and 100 percent"))]
    pub fee_percent: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255, message = "Image public id must be at most 255 characters"))]
    pub image_public_id: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPlatform {
    pub name: String,
    pub description: String,
    pub account_name: String,
    pub account_number: String,
    pub fee_percent: i32,
    pub is_active: bool,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
}

impl From<CreatePlatformRequest> for NewPlatform {
    fn from(req: CreatePlatformRequest) -> Self {
        Self {
            name: req.name.unwrap_or_default().trim().to_string(),
            description: req.description.unwrap_or_default().trim().to_string(),
            account_name: req.account_name.unwrap_or_default().trim().to_string(),
            account_number: req.account_number.unwrap_or_default().trim().to_string(),
            fee_percent: req.fee_percent.unwrap_or(0),
            is_active: req.is_active.unwrap_or(false),
            image_public_id: clean(req.image_public_id),
            image_url: clean(req.image_url),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlatformRequest {
    #[validate(
        length(min = 2, max = 80, message = "Name must be between 2 and 80 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(
        length(min = 1, max = 120, message = "Account name must be between 1 and 120 characters"),
        custom(function = "not_blank")
    )]
    pub account_name: Option<String>,
    #[validate(
        length(min = 4, max = 64, message = "Account number must be between 4 and 64 characters"),
        custom(function = "not_blank")
    )]
    pub account_number: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Fee must be between 0 and 100 percent"))]
    pub fee_percent: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255, message = "Image public id must be at most 255 characters"))]
    pub image_public_id: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlatformPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub fee_percent: Option<i32>,
    pub is_active: Option<bool>,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
}

impl PlatformPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.account_name.is_none()
            && self.account_number.is_none()
            && self.fee_percent.is_none()
            && self.is_active.is_none()
            && self.image_public_id.is_none()
            && self.image_url.is_none()
    }

    pub fn apply(&self, platform: &mut Platform) {
        if let Some(name) = &self.name {
            platform.name = name.clone();
        }
        if let Some(description) = &self.description {
            platform.description = description.clone();
        }
        if let Some(account_name) = &self.account_name {
            platform.account_name = account_name.clone();
        }
        if let Some(account_number) = &self.account_number {
            platform.account_number = account_number.clone();
        }
        if let Some(fee) = self.fee_percent {
            platform.fee_percent = fee;
        }
        if let Some(active) = self.is_active {
            platform.is_active = active;
        }
        if let Some(public_id) = &self.image_public_id {
            platform.image_public_id = Some(public_id.clone());
        }
        if let Some(url) = &self.image_url {
            platform.image_url = Some(url.clone());
        }
    }
}

impl From<UpdatePlatformRequest> for PlatformPatch {
    fn from(req: UpdatePlatformRequest) -> Self {
        Self {
            name: clean(req.name),
            description: req.description.map(|d| d.trim().to_string()),
            account_name: clean(req.account_name),
            account_number: clean(req.account_number),
            fee_percent: req.fee_percent,
            is_active: req.is_active,
            image_public_id: clean(req.image_public_id),
            image_url: clean(req.image_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(is_active: bool) -> Platform {
        Platform {
            id: Uuid::new_v4(),
            name: "Mobile Money".to_string(),
            description: String::new(),
            account_name: "Shop Ltd".to_string(),
            account_number: "0011223344".to_string(),
            fee_percent: 2,
            is_active,
            image_public_id: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deletion_rules() {
        assert!(platform(true).deletion_blocker(0).is_some());
        assert!(platform(false).deletion_blocker(2).unwrap().contains("transactions"));
        assert!(platform(false).deletion_blocker(0).is_none());
    }

    #[test]
    fn fee_above_hundred_is_rejected() {
        let req: UpdatePlatformRequest =
            serde_json::from_value(serde_json::json!({ "fee_percent": 150 })).unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("fee_percent"));
    }
}
