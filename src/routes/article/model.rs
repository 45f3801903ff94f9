use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::{clean, not_blank};

/// 博客文章，is_active 表示已发布
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub reading_minutes: i32,
    pub is_active: bool,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn deletion_blocker(&self) -> Option<String> {
        self.is_active
            .then(|| "Cannot delete a published article. Unpublish it first.".to_string())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateArticleRequest {
    #[validate(
        required(message = "Title is required"),
        length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,
    #[validate(length(max = 500, message = "Excerpt must be at most 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(
        required(message = "Content is required"),
        length(min = 1, max = 100_000, message = "Content must be between 1 and 100000 characters"),
        custom(function = "not_blank")
    )]
    pub content: Option<String>,
    #[validate(
        required(message = "Author is required"),
        length(min = 1, max = 100, message = "Author must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub author: Option<String>,
    #[validate(range(min = 1, max = 600, message = "Reading time must be between 1 and 600 minutes"))]
    pub reading_minutes: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255, message = "Image public id must be at most 255 characters"))]
    pub image_public_id: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub reading_minutes: i32,
    pub is_active: bool,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
}

impl From<CreateArticleRequest> for NewArticle {
    fn from(req: CreateArticleRequest) -> Self {
        Self {
            title: req.title.unwrap_or_default().trim().to_string(),
            excerpt: req.excerpt.unwrap_or_default().trim().to_string(),
            content: req.content.unwrap_or_default(),
            author: req.author.unwrap_or_default().trim().to_string(),
            reading_minutes: req.reading_minutes.unwrap_or(1),
            is_active: req.is_active.unwrap_or(false),
            image_public_id: clean(req.image_public_id),
            image_url: clean(req.image_url),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateArticleRequest {
    #[validate(
        length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,
    #[validate(length(max = 500, message = "Excerpt must be at most 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(
        length(min = 1, max = 100_000, message = "Content must be between 1 and 100000 characters"),
        custom(function = "not_blank")
    )]
    pub content: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Author must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub author: Option<String>,
    #[validate(range(min = 1, max = 600, message = "Reading time must be between 1 and 600 minutes"))]
    pub reading_minutes: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255, message = "Image public id must be at most 255 characters"))]
    pub image_public_id: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub reading_minutes: Option<i32>,
    pub is_active: Option<bool>,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.excerpt.is_none()
            && self.content.is_none()
            && self.author.is_none()
            && self.reading_minutes.is_none()
            && self.is_active.is_none()
            && self.image_public_id.is_none()
            && self.image_url.is_none()
    }

    pub fn apply(&self, article: &mut Article) {
        if let Some(title) = &self.title {
            article.title = title.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            article.excerpt = excerpt.clone();
        }
        if let Some(content) = &self.content {
            article.content = content.clone();
        }
        if let Some(author) = &self.author {
            article.author = author.clone();
        }
        if let Some(minutes) = self.reading_minutes {
            article.reading_minutes = minutes;
        }
        if let Some(active) = self.is_active {
            article.is_active = active;
        }
        if let Some(public_id) = &self.image_public_id {
            article.image_public_id = Some(public_id.clone());
        }
        if let Some(url) = &self.image_url {
            article.image_url = Some(url.clone());
        }
    }
}

impl From<UpdateArticleRequest> for ArticlePatch {
    fn from(req: UpdateArticleRequest) -> Self {
        Self {
            title: clean(req.title),
            excerpt: req.excerpt.map(|e| e.trim().to_string()),
            content: req.content,
            author: clean(req.author),
            reading_minutes: req.reading_minutes,
            is_active: req.is_active,
            image_public_id: clean(req.image_public_id),
            image_url: clean(req.image_url),
        }
    }
}
