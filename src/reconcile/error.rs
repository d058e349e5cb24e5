use thiserror::Error;

use crate::ledger::LedgerError;
use crate::store::StoreError;

/// Reasons a reconciliation pass aborts. The cursor is unchanged in every case.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Ledger query failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Ledger node answered with status {0:?}")]
    UnexpectedStatus(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Transient conditions the next scheduled pass will likely clear.
    /// Node-reported errors usually mean misconfiguration and need an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Ledger(LedgerError::RemoteUnavailable(_)) => true,
            ReconcileError::Ledger(LedgerError::MalformedResponse(_)) => true,
            ReconcileError::Ledger(LedgerError::RemoteError { .. }) => false,
            ReconcileError::UnexpectedStatus(_) => true,
            ReconcileError::Store(_) => true,
        }
    }
}
