//! Ledger Query Adapter
//!
//! Typed wrappers over the node's `account_info` and `account_tx` methods.
//! No retries here: a failed query fails the caller's pass.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::LedgerClient;
pub use error::LedgerError;
pub use types::{AccountInfo, AccountTxPage, AccountTxParams, LedgerAmount, LedgerTransaction};
