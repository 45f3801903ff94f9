use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{DashboardRepository, RepoResult};
use crate::routes::dashboard::model::{DashboardStats, StatsRow};

const STATS_QUERY: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM applications) AS applications_total,
        (SELECT COUNT(*) FROM applications WHERE is_active) AS applications_active,
        (SELECT COUNT(*) FROM articles) AS articles_total,
        (SELECT COUNT(*) FROM articles WHERE is_active) AS articles_published,
        (SELECT COUNT(*) FROM platforms) AS platforms_total,
        (SELECT COUNT(*) FROM platforms WHERE is_active) AS platforms_active,
        (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS orders_pending,
        (SELECT COUNT(*) FROM orders WHERE status = 'completed') AS orders_completed,
        (SELECT COUNT(*) FROM orders WHERE status = 'cancelled') AS orders_cancelled,
        (SELECT COUNT(*) FROM orders WHERE status = 'refunded') AS orders_refunded,
        (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM orders WHERE status = 'completed')
            AS revenue_cents
"#;

pub struct DashboardOperation {
    db: Arc<PgPool>,
}

impl DashboardOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DashboardRepository for DashboardOperation {
    async fn stats(&self) -> RepoResult<DashboardStats> {
        let row = sqlx::query_as::<_, StatsRow>(STATS_QUERY)
            .fetch_one(&*self.db)
            .await?;
        Ok(row.into())
    }
}
