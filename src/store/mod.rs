//! Order and cursor persistence seams
//!
//! The engine only sees [`OrderStore`] and [`CursorStore`]. Two backends:
//! - [`memory`]: process-local maps, for tests and database-less runs
//! - [`postgres`]: `sqlx` tables created by [`crate::db::Database::init_schema`]

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use memory::{MemoryCursorStore, MemoryOrderStore};
pub use postgres::{PgCursorStore, PgOrderStore};

/// Order identifier; doubles as the payment's destination tag
pub type OrderId = i64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    OnHold,
    Paid,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "on-hold" => Ok(OrderStatus::OnHold),
            "paid" => Ok(OrderStatus::Paid),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(StoreError::Corrupt(format!("unknown order status {:?}", other))),
        }
    }
}

/// Shop order as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub id: OrderId,
    pub total: Decimal,
    /// ISO 4217 code, e.g. "USD"
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Ids of `pending` orders created within `window` of now
    async fn list_pending(&self, window: chrono::Duration) -> Result<Vec<OrderId>, StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<PendingOrder>, StoreError>;

    /// `pending -> paid` and append `note`. Returns false when the order was not pending.
    async fn mark_paid(&self, id: OrderId, note: &str) -> Result<bool, StoreError>;

    /// `pending -> on-hold` and append `note`. Returns false when the order was not pending.
    async fn mark_on_hold(&self, id: OrderId, note: &str) -> Result<bool, StoreError>;
}

/// Durable scalar per key. `set` never lowers a stored value.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn set(&self, key: &str, ledger_index: i64) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::OnHold,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serde_matches_db_text() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::OnHold).unwrap(),
            "\"on-hold\""
        );
    }
}
