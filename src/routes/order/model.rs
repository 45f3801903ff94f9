use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// pending -> completed | cancelled，completed -> refunded
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Completed, OrderStatus::Refunded)
        )
    }

    /// 已成交（含已退款）的订单保留作为交易记录
    pub fn is_deletable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }

    /// 状态变化对应用销量的影响
    pub fn sales_delta(&self, next: OrderStatus) -> i32 {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::Completed) => 1,
            (OrderStatus::Completed, OrderStatus::Refunded) => -1,
            _ => 0,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown order status {s:?}"))
    }
}

/// 数据库行，status 为文本列
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub platform_id: Uuid,
    pub application_name: Option<String>,
    pub platform_name: Option<String>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub amount_cents: i64,
    pub status: String,
    pub transaction_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub application_id: Uuid,
    pub platform_id: Uuid,
    pub application_name: Option<String>,
    pub platform_name: Option<String>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub amount_cents: i64,
    pub status: OrderStatus,
    pub transaction_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            application_id: row.application_id,
            platform_id: row.platform_id,
            application_name: row.application_name,
            platform_name: row.platform_name,
            buyer_name: row.buyer_name,
            buyer_email: row.buyer_email,
            amount_cents: row.amount_cents,
            transaction_reference: row.transaction_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Order {
    /// 删除回执中的标识：买家 + 订单号
    pub fn label(&self) -> String {
        format!("{} #{}", self.buyer_name, self.id)
    }

    pub fn deletion_blocker(&self) -> Option<String> {
        if self.status.is_deletable() {
            None
        } else {
            Some(format!(
                "Cannot delete a {} order. Only pending or cancelled orders can be removed.",
                self.status
            ))
        }
    }

    pub fn transition_blocker(&self, next: OrderStatus) -> Option<String> {
        if self.status.can_transition_to(next) {
            None
        } else {
            Some(format!(
                "Cannot change order status from {} to {}",
                self.status, next
            ))
        }
    }
}

fn order_status(value: &str) -> Result<(), ValidationError> {
    value.parse::<OrderStatus>().map(|_| ()).map_err(|_| {
        ValidationError::new("order_status").with_message(Cow::Borrowed(
            "Status must be one of pending, completed, cancelled, refunded",
        ))
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    #[validate(
        required(message = "Status is required"),
        custom(function = "order_status")
    )]
    pub status: Option<String>,
    #[validate(length(min = 1, max = 120, message = "Transaction reference must be between 1 and 120 characters"))]
    pub transaction_reference: Option<String>,
}

impl UpdateOrderStatusRequest {
    /// 校验通过后调用
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}
