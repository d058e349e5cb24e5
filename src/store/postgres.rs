use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use super::{CursorStore, OrderId, OrderStatus, OrderStore, PendingOrder, StoreError};

/// Orders in `shop_orders`, notes in `order_notes`
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Guarded `pending -> to` transition plus note, in one transaction
    async fn transition(
        &self,
        id: OrderId,
        to: OrderStatus,
        note: &str,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE shop_orders
               SET status = $1, updated_at = NOW()
               WHERE order_id = $2 AND status = $3"#,
        )
        .bind(to.as_str())
        .bind(id)
        .bind(OrderStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>("SELECT order_id FROM shop_orders WHERE order_id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(StoreError::OrderNotFound(id)),
            };
        }

        sqlx::query("INSERT INTO order_notes (order_id, note) VALUES ($1, $2)")
            .bind(id)
            .bind(note)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn list_pending(&self, window: chrono::Duration) -> Result<Vec<OrderId>, StoreError> {
        let since: DateTime<Utc> = Utc::now() - window;
        let ids = sqlx::query_scalar::<_, i64>(
            r#"SELECT order_id FROM shop_orders
               WHERE status = $1 AND created_at >= $2
               ORDER BY order_id"#,
        )
        .bind(OrderStatus::Pending.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn get(&self, id: OrderId) -> Result<Option<PendingOrder>, StoreError> {
        let row = sqlx::query(
            r#"SELECT order_id, total, currency, status, created_at
               FROM shop_orders WHERE order_id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        Ok(Some(PendingOrder {
            id: row.try_get("order_id")?,
            total: row.try_get::<Decimal, _>("total")?,
            currency: row.try_get("currency")?,
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn mark_paid(&self, id: OrderId, note: &str) -> Result<bool, StoreError> {
        self.transition(id, OrderStatus::Paid, note).await
    }

    async fn mark_on_hold(&self, id: OrderId, note: &str) -> Result<bool, StoreError> {
        self.transition(id, OrderStatus::OnHold, note).await
    }
}

/// Cursors in `ledger_cursor`
pub struct PgCursorStore {
    pool: PgPool,
}

impl PgCursorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorStore for PgCursorStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT ledger_index FROM ledger_cursor WHERE cursor_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, ledger_index: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO ledger_cursor (cursor_key, ledger_index)
               VALUES ($1, $2)
               ON CONFLICT (cursor_key) DO UPDATE
               SET ledger_index = GREATEST(ledger_cursor.ledger_index, EXCLUDED.ledger_index),
                   updated_at = NOW()"#,
        )
        .bind(key)
        .bind(ledger_index)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
