use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ArticleRepository, RepoResult, RepositoryError, Updated};
use crate::routes::article::model::{Article, ArticlePatch, NewArticle};

const COLUMNS: &str = "id, title, excerpt, content, author, reading_minutes, is_active, \
                       image_public_id, image_url, created_at, updated_at";

/// 文章仓储
pub struct ArticleOperation {
    db: Arc<PgPool>,
}

impl ArticleOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleRepository for ArticleOperation {
    async fn list(&self) -> RepoResult<Vec<Article>> {
        let rows = sqlx::query_as::<_, Article>(&format!(
            "SELECT {COLUMNS} FROM articles ORDER BY created_at DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> RepoResult<Article> {
        sqlx::query_as::<_, Article>(&format!("SELECT {COLUMNS} FROM articles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(RepositoryError::NotFound("Article"))
    }

    async fn create(&self, new: NewArticle) -> RepoResult<Article> {
        let row = sqlx::query_as::<_, Article>(&format!(
            r#"
            INSERT INTO articles (
                id, title, excerpt, content, author, reading_minutes, is_active,
                image_public_id, image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.excerpt)
        .bind(&new.content)
        .bind(&new.author)
        .bind(new.reading_minutes)
        .bind(new.is_active)
        .bind(&new.image_public_id)
        .bind(&new.image_url)
        .fetch_one(&*self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: ArticlePatch) -> RepoResult<Updated<Article>> {
        let mut tx = self.db.begin().await?;

        let mut article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {COLUMNS} FROM articles WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Article"))?;

        let previous_image = article.image_public_id.clone();
        patch.apply(&mut article);

        let updated = sqlx::query_as::<_, Article>(&format!(
            r#"
            UPDATE articles
            SET title = $2, excerpt = $3, content = $4, author = $5, reading_minutes = $6,
                is_active = $7, image_public_id = $8, image_url = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&article.title)
        .bind(&article.excerpt)
        .bind(&article.content)
        .bind(&article.author)
        .bind(article.reading_minutes)
        .bind(article.is_active)
        .bind(&article.image_public_id)
        .bind(&article.image_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let current_image = updated.image_public_id.clone();
        Ok(Updated::new(updated, previous_image, current_image.as_deref()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Article> {
        let mut tx = self.db.begin().await?;

        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {COLUMNS} FROM articles WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Article"))?;

        if let Some(reason) = article.deletion_blocker() {
            return Err(RepositoryError::BusinessRule(reason));
        }

        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(article)
    }
}
