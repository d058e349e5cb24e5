//! Ripple Checkout - payment reconciliation for a shop's Ripple wallet
//!
//! Shoppers pay pending orders by sending funds to the shop wallet with the
//! order id as destination tag. A periodic pass reads the wallet's history
//! from a ledger node and settles the matching orders.
//!
//! # Modules
//!
//! - [`config`] - YAML configuration (`config/{env}.yaml`)
//! - [`logging`] - tracing subscriber and rolling file appender
//! - [`rpc`] - JSON-RPC 1.0 transport to the ledger node
//! - [`ledger`] - typed `account_info` / `account_tx` adapter
//! - [`store`] - order and cursor persistence (memory, Postgres)
//! - [`db`] - Postgres pool and schema
//! - [`reconcile`] - the reconciliation pass
//! - [`payment_uri`] - payment request URIs handed to the shopper
//! - [`trigger`] - scheduler and HTTP gateway

pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod payment_uri;
pub mod reconcile;
pub mod rpc;
pub mod store;
pub mod trigger;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use ledger::{LedgerClient, LedgerError, LedgerTransaction};
pub use payment_uri::PaymentRequest;
pub use reconcile::{EngineSettings, PassReport, ReconcileError, ReconciliationEngine};
pub use rpc::{HttpRpcClient, RpcTransport};
pub use store::{CursorStore, OrderId, OrderStatus, OrderStore, PendingOrder};
