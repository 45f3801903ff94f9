use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AdminRepository, RepoResult};
use crate::routes::auth::model::AdminUser;

/// 管理员账号仓储
pub struct AdminOperation {
    db: Arc<PgPool>,
}

impl AdminOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdminRepository for AdminOperation {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT id, email, password_hash, role, is_active, created_at
            FROM admin_users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.db)
        .await?;
        Ok(admin)
    }

    async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO admin_users (id, email, password_hash, role, is_active)
            SELECT $1, $2, $3, $4, TRUE
            WHERE NOT EXISTS (SELECT 1 FROM admin_users WHERE LOWER(email) = LOWER($2))
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .execute(&*self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
