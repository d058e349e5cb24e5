use serde::Serialize;
use utoipa::ToSchema;

use crate::store::OrderId;

/// What a pass did to one order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Exact amount and currency: order marked paid
    Paid,
    /// Tag matched but amount or currency differs: on-hold for review
    AmountMismatch,
    /// Several payments carry the tag: on-hold for review
    DuplicateTag,
}

impl SettlementOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self, SettlementOutcome::Paid)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Settlement {
    pub order_id: OrderId,
    pub outcome: SettlementOutcome,
    pub transaction_hashes: Vec<String>,
    /// Highest ledger index among the matched transactions
    pub ledger_index: i64,
}

/// An order whose update failed; retried on a later pass
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderFailure {
    pub order_id: OrderId,
    pub error: String,
    /// Lowest ledger index among the transactions for this order
    pub ledger_index: i64,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PassReport {
    pub cursor_before: i64,
    pub cursor_after: i64,
    pub query_min: i64,
    /// `ledger_index_max` reported by the node
    pub ledger_index_max: i64,
    pub transactions_seen: usize,
    /// History entries that could not be decoded
    pub entries_skipped: usize,
    /// The page limit was hit before the end of history
    pub truncated: bool,
    pub settlements: Vec<Settlement>,
    pub failures: Vec<OrderFailure>,
}

impl PassReport {
    pub fn paid_count(&self) -> usize {
        self.settlements
            .iter()
            .filter(|s| s.outcome.is_paid())
            .count()
    }

    pub fn on_hold_count(&self) -> usize {
        self.settlements.len() - self.paid_count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
