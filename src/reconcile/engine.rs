//! Reconciliation Engine - one poll/match/update/persist cycle per call
//!
//! ```text
//! cursor ──▶ account_tx(wallet, cursor - overlap, latest) ──▶ MatchTable
//!                                                                │
//!   cursor' ◀── advance ◀── mark paid / on-hold ◀── pending orders
//! ```
//!
//! Transport, protocol and node errors abort the pass before any write, so
//! the cursor only moves after every matched order has been evaluated.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::error::ReconcileError;
use super::guard::PassGuard;
use super::matching::{MatchTable, amount_matches, duplicate_tag_note, settlement_note};
use super::report::{OrderFailure, PassReport, Settlement, SettlementOutcome};
use crate::config::AppConfig;
use crate::ledger::{AccountTxParams, LedgerClient, LedgerTransaction};
use crate::store::{CursorStore, OrderId, OrderStatus, OrderStore, StoreError};

/// Cursor value before the first successful pass
pub const GENESIS_CURSOR: i64 = -1;
/// Trailing ledgers re-scanned every pass
pub const DEFAULT_OVERLAP: i64 = 10;
/// `account_tx` pages read per pass before the rest is left to the next one
pub const DEFAULT_MAX_PAGES: usize = 20;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Account whose incoming payments settle orders
    pub wallet_address: String,
    /// How far back pending orders are considered
    pub pending_window: chrono::Duration,
    pub overlap: i64,
    pub max_pages: usize,
}

impl EngineSettings {
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            pending_window: chrono::Duration::days(7),
            overlap: DEFAULT_OVERLAP,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            wallet_address: config.wallet.address.clone(),
            pending_window: config.reconcile.pending_window(),
            overlap: config.reconcile.overlap,
            max_pages: config.reconcile.max_pages,
        }
    }
}

/// First ledger of the next query: re-scan `overlap` ledgers behind the cursor
pub fn overlap_start(cursor: i64, overlap: i64) -> i64 {
    if cursor > overlap {
        cursor - overlap
    } else {
        cursor
    }
}

pub struct ReconciliationEngine {
    ledger: LedgerClient,
    orders: Arc<dyn OrderStore>,
    cursors: Arc<dyn CursorStore>,
    settings: EngineSettings,
    guard: Arc<PassGuard>,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: LedgerClient,
        orders: Arc<dyn OrderStore>,
        cursors: Arc<dyn CursorStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            ledger,
            orders,
            cursors,
            settings,
            guard: Arc::new(PassGuard::new()),
        }
    }

    /// Share a guard with other engines polling the same wallet
    pub fn with_guard(mut self, guard: Arc<PassGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn wallet_address(&self) -> &str {
        &self.settings.wallet_address
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    /// Stable persistence key of this wallet's cursor
    pub fn cursor_key(&self) -> String {
        format!("ledger_cursor:{}", self.settings.wallet_address)
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_busy(&self.settings.wallet_address)
    }

    /// Current persisted cursor (GENESIS_CURSOR when absent)
    pub async fn cursor(&self) -> Result<i64, ReconcileError> {
        Ok(self
            .cursors
            .get(&self.cursor_key())
            .await?
            .unwrap_or(GENESIS_CURSOR))
    }

    /// Run one reconciliation pass
    pub async fn run_pass(&self) -> Result<PassReport, ReconcileError> {
        let wallet = self.settings.wallet_address.as_str();
        let _permit = self.guard.acquire(wallet).await;

        // 1-2. Cursor and overlap
        let cursor_before = self.cursor().await?;
        let query_min = overlap_start(cursor_before, self.settings.overlap);
        debug!(
            "{}: pass start, cursor {}, querying from ledger {}",
            wallet, cursor_before, query_min
        );

        // 3-5. Fetch history; any failure leaves the cursor untouched
        let page = self
            .ledger
            .account_history(
                &AccountTxParams::forward_from(wallet, query_min),
                self.settings.max_pages,
            )
            .await
            .inspect_err(|e| warn!("{}: account_tx failed: {}", wallet, e))?;

        if page.status != "success" {
            warn!("{}: account_tx status {:?}, pass aborted", wallet, page.status);
            return Err(ReconcileError::UnexpectedStatus(page.status));
        }

        // 6. Candidate cursor. A history cut short stops below the last ledger
        // read, since that ledger may continue on the unread pages.
        let ledger_index_max = page.ledger_index_max;
        let readable_max = if page.is_truncated() {
            let held = page
                .highest_ledger()
                .map_or(cursor_before, |highest| highest - 1)
                .min(ledger_index_max);
            warn!(
                "{}: history truncated after {} pages, cursor capped at {}",
                wallet, self.settings.max_pages, held
            );
            held
        } else {
            ledger_index_max
        };
        if page.skipped > 0 {
            warn!("{}: {} unreadable history entries skipped", wallet, page.skipped);
        }
        let mut report = PassReport {
            cursor_before,
            cursor_after: cursor_before,
            query_min,
            ledger_index_max,
            transactions_seen: page.transactions.len(),
            entries_skipped: page.skipped,
            truncated: page.is_truncated(),
            settlements: Vec::new(),
            failures: Vec::new(),
        };

        // 7-8. Nothing to reconcile still records progress
        let table = MatchTable::build(wallet, &page.transactions);
        if table.is_empty() {
            report.cursor_after = self.advance_cursor(cursor_before, readable_max).await?;
            info!(
                "{}: {} transactions, none tagged; cursor {} -> {}",
                wallet, report.transactions_seen, cursor_before, report.cursor_after
            );
            return Ok(report);
        }

        // 9-10. Settle pending orders that have candidates
        let pending = self.orders.list_pending(self.settings.pending_window).await?;
        debug!(
            "{}: {} tagged payments, {} pending orders",
            wallet,
            table.len(),
            pending.len()
        );

        for order_id in pending {
            let Some(candidates) = table.lookup(order_id) else {
                continue;
            };
            match self.settle(order_id, candidates).await {
                Ok(Some(settlement)) => report.settlements.push(settlement),
                Ok(None) => {}
                Err(e) => {
                    error!("{}: failed to update order {}: {}", wallet, order_id, e);
                    report.failures.push(OrderFailure {
                        order_id,
                        error: e.to_string(),
                        ledger_index: lowest_ledger(candidates),
                    });
                }
            }
        }

        // 11. Hold the cursor below any transaction whose order update failed
        let target = report
            .failures
            .iter()
            .map(|f| f.ledger_index - 1)
            .min()
            .map_or(readable_max, |held| held.min(readable_max));
        report.cursor_after = self.advance_cursor(cursor_before, target).await?;

        info!(
            "{}: pass done, {} txs, {} paid, {} on-hold, {} failed; cursor {} -> {}",
            wallet,
            report.transactions_seen,
            report.paid_count(),
            report.on_hold_count(),
            report.failures.len(),
            cursor_before,
            report.cursor_after
        );
        Ok(report)
    }

    /// Evaluate one pending order against its candidates.
    /// `Ok(None)` when the order is gone or no longer pending.
    async fn settle(
        &self,
        order_id: OrderId,
        candidates: &[LedgerTransaction],
    ) -> Result<Option<Settlement>, StoreError> {
        let Some(order) = self.orders.get(order_id).await? else {
            warn!("Order {} listed as pending but not found", order_id);
            return Ok(None);
        };
        if order.status != OrderStatus::Pending {
            debug!("Order {} is {}, skipping", order_id, order.status);
            return Ok(None);
        }

        let (outcome, changed) = match candidates {
            [tx] if amount_matches(&order, tx) => (
                SettlementOutcome::Paid,
                self.orders.mark_paid(order_id, &settlement_note(tx)).await?,
            ),
            [tx] => (
                SettlementOutcome::AmountMismatch,
                self.orders
                    .mark_on_hold(order_id, &settlement_note(tx))
                    .await?,
            ),
            many => (
                SettlementOutcome::DuplicateTag,
                self.orders
                    .mark_on_hold(order_id, &duplicate_tag_note(many))
                    .await?,
            ),
        };

        if !changed {
            return Ok(None);
        }

        match outcome {
            SettlementOutcome::Paid => info!(
                "Order {} paid by {} ({}/{})",
                order_id,
                candidates[0].hash,
                candidates[0].amount.value(),
                candidates[0].amount.currency()
            ),
            SettlementOutcome::AmountMismatch => warn!(
                "Order {} on-hold: received {}/{}, expected {}/{}",
                order_id,
                candidates[0].amount.value(),
                candidates[0].amount.currency(),
                order.total,
                order.currency
            ),
            SettlementOutcome::DuplicateTag => warn!(
                "Order {} on-hold: {} payments share its tag",
                order_id,
                candidates.len()
            ),
        }

        Ok(Some(Settlement {
            order_id,
            outcome,
            transaction_hashes: candidates.iter().map(|tx| tx.hash.clone()).collect(),
            ledger_index: candidates
                .iter()
                .map(|tx| tx.ledger_index)
                .max()
                .unwrap_or_default(),
        }))
    }

    /// Persist `max(current, target)`; never rewinds
    async fn advance_cursor(&self, current: i64, target: i64) -> Result<i64, ReconcileError> {
        if target < current {
            warn!(
                "{}: cursor target {} is behind stored cursor {}, keeping it",
                self.settings.wallet_address, target, current
            );
            return Ok(current);
        }
        if target > current {
            self.cursors.set(&self.cursor_key(), target).await?;
        }
        Ok(target)
    }
}

fn lowest_ledger(candidates: &[LedgerTransaction]) -> i64 {
    candidates
        .iter()
        .map(|tx| tx.ledger_index)
        .min()
        .unwrap_or_default()
}
