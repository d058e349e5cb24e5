//! Database connection management

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Shop orders, owned by the storefront; this service only flips status
pub const CREATE_SHOP_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS shop_orders (
    order_id    BIGINT PRIMARY KEY CHECK (order_id >= 1),
    total       NUMERIC(20, 8) NOT NULL,
    currency    VARCHAR(3) NOT NULL,
    status      VARCHAR(16) NOT NULL DEFAULT 'pending',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

pub const CREATE_ORDER_NOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS order_notes (
    note_id     BIGSERIAL PRIMARY KEY,
    order_id    BIGINT NOT NULL REFERENCES shop_orders (order_id),
    note        TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

pub const CREATE_LEDGER_CURSOR_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_cursor (
    cursor_key    VARCHAR(128) PRIMARY KEY,
    ledger_index  BIGINT NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

pub const CREATE_PENDING_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_shop_orders_status_created ON shop_orders (status, created_at)";

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables this service reads and writes
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for statement in [
            CREATE_SHOP_ORDERS_TABLE,
            CREATE_ORDER_NOTES_TABLE,
            CREATE_LEDGER_CURSOR_TABLE,
            CREATE_PENDING_INDEX,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }
}
