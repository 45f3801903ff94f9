use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCounts {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCounts {
    pub total: i64,
    pub published: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCounts {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub refunded: i64,
}

/// 仪表盘概览
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub applications: ActiveCounts,
    pub articles: ArticleCounts,
    pub platforms: ActiveCounts,
    pub orders: OrderCounts,
    /// 已完成订单的总金额
    pub revenue_cents: i64,
}

/// 统计查询的扁平结果行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatsRow {
    pub applications_total: i64,
    pub applications_active: i64,
    pub articles_total: i64,
    pub articles_published: i64,
    pub platforms_total: i64,
    pub platforms_active: i64,
    pub orders_pending: i64,
    pub orders_completed: i64,
    pub orders_cancelled: i64,
    pub orders_refunded: i64,
    pub revenue_cents: i64,
}

impl From<StatsRow> for DashboardStats {
    fn from(row: StatsRow) -> Self {
        Self {
            applications: ActiveCounts {
                total: row.applications_total,
                active: row.applications_active,
            },
            articles: ArticleCounts {
                total: row.articles_total,
                published: row.articles_published,
            },
            platforms: ActiveCounts {
                total: row.platforms_total,
                active: row.platforms_active,
            },
            orders: OrderCounts {
                total: row.orders_pending
                    + row.orders_completed
                    + row.orders_cancelled
                    + row.orders_refunded,
                pending: row.orders_pending,
                completed: row.orders_completed,
                cancelled: row.orders_cancelled,
                refunded: row.orders_refunded,
            },
            revenue_cents: row.revenue_cents,
        }
    }
}
