use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::{clean, not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub sales_count: i32,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// 上架中或已有销售记录的应用不能删除
    pub fn deletion_blocker(&self, order_count: i64) -> Option<String> {
        if self.is_active {
            return Some("Cannot delete an active application. Deactivate it first.".to_string());
        }
        let sales = i64::from(self.sales_count).max(order_count);
        if sales > 0 {
            return Some(format!(
                "Cannot delete an application with existing sales ({sales} recorded)"
            ));
        }
        None
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    #[validate(
        required(message = "Name is required"),
        length(min = 2, max = 120, message = "Name must be between 2 and 120 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(
        required(message = "Category is required"),
        length(min = 1, max = 60, message = "Category must be between 1 and 60 characters"),
        custom(function = "not_blank")
    )]
    pub category: Option<String>,
    #[validate(
        required(message = "Price is required"),
        range(min = 0, max = 100_000_000, message = "Price must be between 0 and 100000000 cents")
    )]
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255, message = "Image public id must be at most 255 characters"))]
    pub image_public_id: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

/// 清洗后的新建参数
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
}

impl From<CreateApplicationRequest> for NewApplication {
    fn from(req: CreateApplicationRequest) -> Self {
        Self {
            name: req.name.unwrap_or_default().trim().to_string(),
            description: req.description.unwrap_or_default().trim().to_string(),
            category: req.category.unwrap_or_default().trim().to_string(),
            price_cents: req.price_cents.unwrap_or_default(),
            is_active: req.is_active.unwrap_or(false),
            image_public_id: clean(req.image_public_id),
            image_url: clean(req.image_url),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateApplicationRequest {
    #[validate(
        length(min = 2, max = 120, message = "Name must be between 2 and 120 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(
        length(min = 1, max = 60, message = "Category must be between 1 and 60 characters"),
        custom(function = "not_blank")
    )]
    pub category: Option<String>,
    #[validate(range(min = 0, max = 100_000_000, message = "Price must be between 0 and 100000000 cents"))]
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255, message = "Image public id must be at most 255 characters"))]
    pub image_public_id: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

/// 部分更新，None 表示保持原值
#[derive(Debug, Clone, Default)]
pub struct ApplicationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
}

impl ApplicationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price_cents.is_none()
            && self.is_active.is_none()
            && self.image_public_id.is_none()
            && self.image_url.is_none()
    }

    pub fn apply(&self, application: &mut Application) {
        if let Some(name) = &self.name {
            application.name = name.clone();
        }
        if let Some(description) = &self.description {
            application.description = description.clone();
        }
        if let Some(category) = &self.category {
            application.category = category.clone();
        }
        if let Some(price) = self.price_cents {
            application.price_cents = price;
        }
        if let Some(active) = self.is_active {
            application.is_active = active;
        }
        if let Some(public_id) = &self.image_public_id {
            application.image_public_id = Some(public_id.clone());
        }
        if let Some(url) = &self.image_url {
            application.image_url = Some(url.clone());
        }
    }
}

impl From<UpdateApplicationRequest> for ApplicationPatch {
    fn from(req: UpdateApplicationRequest) -> Self {
        Self {
            name: clean(req.name),
            // 描述允许清空
            description: req.description.map(|d| d.trim().to_string()),
            category: clean(req.category),
            price_cents: req.price_cents,
            is_active: req.is_active,
            image_public_id: clean(req.image_public_id),
            image_url: clean(req.image_url),
        }
    }
}
