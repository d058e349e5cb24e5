//! Tag matching and amount verification
//!
//! Pure functions over one pass worth of transactions. No I/O.

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::ledger::LedgerTransaction;
use crate::store::{OrderId, PendingOrder};

/// Candidate transactions per destination tag for one pass
#[derive(Debug, Default)]
pub struct MatchTable {
    by_tag: BTreeMap<u64, Vec<LedgerTransaction>>,
}

impl MatchTable {
    /// Index incoming, validated, successful payments to `wallet` by their positive destination tag.
    /// A hash seen twice in the batch is kept once.
    pub fn build(wallet: &str, transactions: &[LedgerTransaction]) -> Self {
        let mut by_tag: BTreeMap<u64, Vec<LedgerTransaction>> = BTreeMap::new();
        let mut seen = HashSet::new();

        for tx in transactions {
            let Some(tag) = tx.correlation_tag() else {
                continue;
            };
            if tx.destination.as_deref().is_some_and(|d| d != wallet) {
                debug!("Skipping outgoing tx {} (tag {})", tx.hash, tag);
                continue;
            }
            if !tx.validated {
                debug!("Skipping unvalidated tx {} (tag {})", tx.hash, tag);
                continue;
            }
            if !tx.is_successful() {
                debug!(
                    "Skipping failed tx {} (tag {}, result {:?})",
                    tx.hash, tag, tx.result
                );
                continue;
            }
            if !seen.insert(tx.hash.as_str()) {
                continue;
            }
            by_tag.entry(tag).or_default().push(tx.clone());
        }

        Self { by_tag }
    }

    /// Candidates for an order, matched on tag == order id
    pub fn lookup(&self, order_id: OrderId) -> Option<&[LedgerTransaction]> {
        let tag = u64::try_from(order_id).ok()?;
        self.by_tag.get(&tag).map(Vec::as_slice)
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Order total at the precision a payment is requested with (2 dp, half away from zero)
pub fn expected_amount(total: Decimal) -> Decimal {
    total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Exact settlement: value equals the rounded total and the currency is the order's
pub fn amount_matches(order: &PendingOrder, tx: &LedgerTransaction) -> bool {
    tx.amount.value() == expected_amount(order.total) && tx.amount.currency() == order.currency
}

/// Audit trail appended to the order
pub fn settlement_note(tx: &LedgerTransaction) -> String {
    format!(
        "Paid: {}/{}\nLedger: {}\nAccount: {}\nTransaction: {}",
        tx.amount.value(),
        tx.amount.currency(),
        tx.ledger_index,
        tx.account,
        tx.hash
    )
}

/// Note for an order with more than one candidate payment
pub fn duplicate_tag_note(candidates: &[LedgerTransaction]) -> String {
    let mut note = format!(
        "Manual review: {} payments carry this order's destination tag",
        candidates.len()
    );
    for tx in candidates {
        note.push_str("\n---\n");
        note.push_str(&settlement_note(tx));
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerAmount;
    use crate::store::OrderStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn usd(hash: &str, tag: Option<u64>, value: Decimal) -> LedgerTransaction {
        LedgerTransaction {
            hash: hash.to_string(),
            account: "rSender".to_string(),
            destination: Some("rWallet".to_string()),
            amount: LedgerAmount::Issued {
                value,
                currency: "USD".to_string(),
                issuer: Some("rIssuer".to_string()),
            },
            destination_tag: tag,
            ledger_index: 505,
            transaction_type: "Payment".to_string(),
            validated: true,
            result: Some("tesSUCCESS".to_string()),
        }
    }

    fn order(total: Decimal, currency: &str) -> PendingOrder {
        PendingOrder {
            id: 42,
            total,
            currency: currency.to_string(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_indexes_positive_tags_only() {
        let txs = vec![
            usd("A", Some(42), dec!(10)),
            usd("B", Some(0), dec!(10)),
            usd("C", None, dec!(10)),
        ];
        let table = MatchTable::build("rWallet", &txs);

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(42).unwrap()[0].hash, "A");
        assert!(table.lookup(0).is_none());
        assert!(table.lookup(-5).is_none());
    }

    #[test]
    fn test_build_skips_outgoing_failed_and_unvalidated() {
        let mut outgoing = usd("OUT", Some(42), dec!(10));
        outgoing.destination = Some("rSomeoneElse".to_string());
        let mut failed = usd("FAIL", Some(42), dec!(10));
        failed.result = Some("tecPATH_DRY".to_string());
        let mut provisional = usd("PROV", Some(42), dec!(10));
        provisional.validated = false;

        let table = MatchTable::build("rWallet", &[outgoing, failed, provisional]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_build_keeps_all_candidates_for_a_tag() {
        let txs = vec![
            usd("A", Some(42), dec!(4)),
            usd("B", Some(42), dec!(6)),
            usd("A", Some(42), dec!(4)),
        ];
        let table = MatchTable::build("rWallet", &txs);

        let candidates = table.lookup(42).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].hash, "A");
        assert_eq!(candidates[1].hash, "B");
    }

    #[test]
    fn test_amount_match_uses_rounded_total() {
        assert!(amount_matches(&order(dec!(10.00), "USD"), &usd("A", Some(42), dec!(10))));
        assert!(amount_matches(&order(dec!(12.345), "USD"), &usd("A", Some(42), dec!(12.35))));
        assert!(!amount_matches(&order(dec!(10.00), "USD"), &usd("A", Some(42), dec!(8.00))));
        assert!(!amount_matches(&order(dec!(10.00), "EUR"), &usd("A", Some(42), dec!(10.00))));
    }

    #[test]
    fn test_native_payment_matches_xrp_order() {
        let mut tx = usd("X", Some(42), dec!(0));
        tx.amount = LedgerAmount::Native { drops: 25_000_000 };
        assert!(amount_matches(&order(dec!(25), "XRP"), &tx));
        assert!(!amount_matches(&order(dec!(25), "USD"), &tx));
    }

    #[test]
    fn test_notes_record_audit_trail() {
        let tx = usd("A", Some(42), dec!(10.00));
        let note = settlement_note(&tx);
        assert!(note.contains("Paid: 10.00/USD"));
        assert!(note.contains("Ledger: 505"));
        assert!(note.contains("Account: rSender"));

        let dup = duplicate_tag_note(&[tx.clone(), usd("B", Some(42), dec!(1))]);
        assert!(dup.starts_with("Manual review: 2 payments"));
        assert!(dup.contains("Transaction: B"));
    }
}
