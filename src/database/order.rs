use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{OrderRepository, RepoResult, RepositoryError};
use crate::routes::order::model::{Order, OrderRow, OrderStatus};

const SELECT_ORDER: &str = r#"
    SELECT o.id, o.application_id, o.platform_id,
           a.name AS application_name, p.name AS platform_name,
           o.buyer_name, o.buyer_email, o.amount_cents, o.status,
           o.transaction_reference, o.created_at, o.updated_at
    FROM orders o
    LEFT JOIN applications a ON a.id = o.application_id
    LEFT JOIN platforms p ON p.id = o.platform_id
"#;

/// 订单仓储
pub struct OrderOperation {
    db: Arc<PgPool>,
}

impl OrderOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

fn into_order(row: OrderRow) -> RepoResult<Order> {
    Order::try_from(row).map_err(|e| RepositoryError::Database(sqlx::Error::Decode(e.into())))
}

/// 加行锁读取订单，只锁 orders 表
async fn lock_order(conn: &mut PgConnection, id: Uuid) -> RepoResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE o.id = $1 FOR UPDATE OF o"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound("Order"))?;
    into_order(row)
}

#[async_trait]
impl OrderRepository for OrderOperation {
    async fn list(&self) -> RepoResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} ORDER BY o.created_at DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        rows.into_iter().map(into_order).collect()
    }

    async fn find(&self, id: Uuid) -> RepoResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(RepositoryError::NotFound("Order"))?;
        into_order(row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        transaction_reference: Option<String>,
    ) -> RepoResult<Order> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, id).await?;
        if let Some(reason) = order.transition_blocker(status) {
            return Err(RepositoryError::BusinessRule(reason));
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                transaction_reference = COALESCE($3, transaction_reference),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(&transaction_reference)
        .execute(&mut *tx)
        .await?;

        // 完成计入销量，退款扣回
        let delta = order.status.sales_delta(status);
        if delta != 0 {
            sqlx::query(
                r#"
                UPDATE applications
                SET sales_count = GREATEST(sales_count + $2, 0), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(order.application_id)
            .bind(delta)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE o.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        into_order(row)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Order> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, id).await?;
        if let Some(reason) = order.deletion_blocker() {
            return Err(RepositoryError::BusinessRule(reason));
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order)
    }
}
