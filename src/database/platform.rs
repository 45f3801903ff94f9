use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PlatformRepository, RepoResult, RepositoryError, Updated};
use crate::routes::platform::model::{NewPlatform, Platform, PlatformPatch};

const COLUMNS: &str = "id, name, description, account_name, account_number, fee_percent, \
                       is_active, image_public_id, image_url, created_at, updated_at";

/// 支付平台仓储
pub struct PlatformOperation {
    db: Arc<PgPool>,
}

impl PlatformOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlatformRepository for PlatformOperation {
    async fn list(&self) -> RepoResult<Vec<Platform>> {
        let rows = sqlx::query_as::<_, Platform>(&format!(
            "SELECT {COLUMNS} FROM platforms ORDER BY created_at DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> RepoResult<Platform> {
        sqlx::query_as::<_, Platform>(&format!("SELECT {COLUMNS} FROM platforms WHERE id = $1"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(RepositoryError::NotFound("Platform"))
    }

    async fn create(&self, new: NewPlatform) -> RepoResult<Platform> {
        let row = sqlx::query_as::<_, Platform>(&format!(
            r#"
            INSERT INTO platforms (
                id, name, description, account_name, account_number, fee_percent,
                is_active, image_public_id, image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.account_name)
        .bind(&new.account_number)
        .bind(new.fee_percent)
        .bind(new.is_active)
        .bind(&new.image_public_id)
        .bind(&new.image_url)
        .fetch_one(&*self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: PlatformPatch) -> RepoResult<Updated<Platform>> {
        let mut tx = self.db.begin().await?;

        let mut platform = sqlx::query_as::<_, Platform>(&format!(
            "SELECT {COLUMNS} FROM platforms WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Platform"))?;

        let previous_image = platform.image_public_id.clone();
        patch.apply(&mut platform);

        let updated = sqlx::query_as::<_, Platform>(&format!(
            r#"
            UPDATE platforms
            SET name = $2, description = $3, account_name = $4, account_number = $5,
                fee_percent = $6, is_active = $7, image_public_id = $8, image_url = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&platform.name)
        .bind(&platform.description)
        .bind(&platform.account_name)
        .bind(&platform.account_number)
        .bind(platform.fee_percent)
        .bind(platform.is_active)
        .bind(&platform.image_public_id)
        .bind(&platform.image_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let current_image = updated.image_public_id.clone();
        Ok(Updated::new(updated, previous_image, current_image.as_deref()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Platform> {
        let mut tx = self.db.begin().await?;

        let platform = sqlx::query_as::<_, Platform>(&format!(
            "SELECT {COLUMNS} FROM platforms WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Platform"))?;

        let transaction_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE platform_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if let Some(reason) = platform.deletion_blocker(transaction_count) {
            return Err(RepositoryError::BusinessRule(reason));
        }

        sqlx::query("DELETE FROM platforms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(platform)
    }
}
