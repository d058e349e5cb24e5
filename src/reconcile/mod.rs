//! Reconciliation of ledger payments against pending shop orders
//!
//! One pass:
//! 1. Read the wallet's cursor (default `-1`)
//! 2. Query `account_tx` from `cursor - overlap` to the latest ledger
//! 3. Index incoming payments by destination tag
//! 4. For each pending order with a matching tag:
//!    - exact amount and currency: `pending -> paid`
//!    - anything else (mismatch, several payments): `pending -> on-hold`
//! 5. Advance the cursor to the node's `ledger_index_max`
//!
//! Order state is a one-way latch: only `pending` orders are touched.

pub mod engine;
pub mod error;
pub mod guard;
pub mod matching;
pub mod report;

pub use engine::{DEFAULT_OVERLAP, EngineSettings, GENESIS_CURSOR, ReconciliationEngine, overlap_start};
pub use error::ReconcileError;
pub use guard::PassGuard;
pub use matching::MatchTable;
pub use report::{OrderFailure, PassReport, Settlement, SettlementOutcome};
