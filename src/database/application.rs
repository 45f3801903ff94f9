use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ApplicationRepository, RepoResult, RepositoryError, Updated};
use crate::routes::application::model::{Application, ApplicationPatch, NewApplication};

const COLUMNS: &str = "id, name, description, category, price_cents, is_active, sales_count, \
                       image_public_id, image_url, created_at, updated_at";

/// 应用仓储
pub struct ApplicationOperation {
    db: Arc<PgPool>,
}

impl ApplicationOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ApplicationRepository for ApplicationOperation {
    async fn list(&self) -> RepoResult<Vec<Application>> {
        let rows = sqlx::query_as::<_, Application>(&format!(
            "SELECT {COLUMNS} FROM applications ORDER BY created_at DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> RepoResult<Application> {
        sqlx::query_as::<_, Application>(&format!(
            "SELECT {COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(RepositoryError::NotFound("Application"))
    }

    async fn create(&self, new: NewApplication) -> RepoResult<Application> {
        let row = sqlx::query_as::<_, Application>(&format!(
            r#"
            INSERT INTO applications (
                id, name, description, category, price_cents, is_active,
                image_public_id, image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.price_cents)
        .bind(new.is_active)
        .bind(&new.image_public_id)
        .bind(&new.image_url)
        .fetch_one(&*self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: ApplicationPatch) -> RepoResult<Updated<Application>> {
        let mut tx = self.db.begin().await?;

        let mut application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {COLUMNS} FROM applications WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Application"))?;

        let previous_image = application.image_public_id.clone();
        patch.apply(&mut application);

        let updated = sqlx::query_as::<_, Application>(&format!(
            r#"
            UPDATE applications
            SET name = $2, description = $3, category = $4, price_cents = $5,
                is_active = $6, image_public_id = $7, image_url = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&application.name)
        .bind(&application.description)
        .bind(&application.category)
        .bind(application.price_cents)
        .bind(application.is_active)
        .bind(&application.image_public_id)
        .bind(&application.image_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let current_image = updated.image_public_id.clone();
        Ok(Updated::new(updated, previous_image, current_image.as_deref()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Application> {
        let mut tx = self.db.begin().await?;

        // 行锁保证检查和删除之间状态不变
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {COLUMNS} FROM applications WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Application"))?;

        let order_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE application_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if let Some(reason) = application.deletion_blocker(order_count) {
            return Err(RepositoryError::BusinessRule(reason));
        }

        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(application)
    }
}
