use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Native currency code
pub const XRP: &str = "XRP";
/// Drops per XRP, as a decimal scale
const XRP_SCALE: u32 = 6;
/// Engine result of a transaction that applied and moved funds
pub const TES_SUCCESS: &str = "tesSUCCESS";

/// Parameters of `account_tx`. `-1` on either bound means "earliest/latest validated".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountTxParams {
    pub account: String,
    pub ledger_index_min: i64,
    pub ledger_index_max: i64,
    pub descending: bool,
    /// Page size; the node's default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Opaque resume point from the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Value>,
}

impl AccountTxParams {
    /// Ascending scan from `ledger_index_min` up to the latest ledger
    pub fn forward_from(account: impl Into<String>, ledger_index_min: i64) -> Self {
        Self {
            account: account.into(),
            ledger_index_min,
            ledger_index_max: -1,
            descending: false,
            limit: None,
            marker: None,
        }
    }

    /// Same query, resumed at `marker`
    pub fn resume_at(&self, marker: Value) -> Self {
        Self {
            marker: Some(marker),
            ..self.clone()
        }
    }
}

/// Account state as reported by `account_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account: String,
    pub balance_drops: u64,
    pub sequence: u64,
    pub ledger_index: Option<i64>,
}

/// One page of account history as reported by `account_tx`
#[derive(Debug, Clone)]
pub struct AccountTxPage {
    pub status: String,
    pub ledger_index_min: Option<i64>,
    pub ledger_index_max: i64,
    pub transactions: Vec<LedgerTransaction>,
    /// Present when more history remains past this page
    pub marker: Option<Value>,
    /// Entries dropped because they could not be decoded
    pub skipped: usize,
}

impl AccountTxPage {
    pub fn is_truncated(&self) -> bool {
        self.marker.is_some()
    }

    /// Highest ledger among the decoded transactions
    pub fn highest_ledger(&self) -> Option<i64> {
        self.transactions.iter().map(|tx| tx.ledger_index).max()
    }
}

/// Amount moved by a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAmount {
    /// Native XRP, in drops
    Native { drops: u64 },
    /// Issued currency (IOU)
    Issued {
        value: Decimal,
        currency: String,
        issuer: Option<String>,
    },
}

impl LedgerAmount {
    pub fn value(&self) -> Decimal {
        match self {
            LedgerAmount::Native { drops } => {
                Decimal::from_i128_with_scale(i128::from(*drops), XRP_SCALE)
            }
            LedgerAmount::Issued { value, .. } => *value,
        }
    }

    pub fn currency(&self) -> &str {
        match self {
            LedgerAmount::Native { .. } => XRP,
            LedgerAmount::Issued { currency, .. } => currency,
        }
    }
}

/// A transaction observed in the wallet's history. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub hash: String,
    /// Sender
    pub account: String,
    pub destination: Option<String>,
    pub amount: LedgerAmount,
    pub destination_tag: Option<u64>,
    pub ledger_index: i64,
    pub transaction_type: String,
    pub validated: bool,
    /// `meta.TransactionResult`, when the node returned metadata
    pub result: Option<String>,
}

impl LedgerTransaction {
    pub fn is_successful(&self) -> bool {
        self.result.as_deref().is_none_or(|r| r == TES_SUCCESS)
    }

    /// Tag usable as an order correlation id (positive)
    pub fn correlation_tag(&self) -> Option<u64> {
        self.destination_tag.filter(|tag| *tag > 0)
    }
}

// ============================================================
// Raw node payloads
// ============================================================

#[derive(Deserialize, Debug)]
pub(crate) struct RawAccountTx {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ledger_index_min: Option<i64>,
    #[serde(default)]
    pub ledger_index_max: Option<i64>,
    /// Decoded one entry at a time so a single odd entry cannot sink the page
    #[serde(default)]
    pub transactions: Option<Vec<Value>>,
    #[serde(default)]
    pub marker: Option<Value>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawTxEntry {
    #[serde(default)]
    pub tx: Option<RawTx>,
    /// API v2 name of `tx`
    #[serde(default)]
    pub tx_json: Option<RawTx>,
    #[serde(default)]
    pub meta: Option<RawMeta>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub ledger_index: Option<i64>,
    #[serde(default)]
    pub validated: bool,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawTx {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "TransactionType", default)]
    pub transaction_type: String,
    #[serde(rename = "Amount", default)]
    pub amount: Option<RawAmount>,
    #[serde(rename = "DeliverMax", default)]
    pub deliver_max: Option<RawAmount>,
    #[serde(rename = "Destination", default)]
    pub destination: Option<String>,
    #[serde(rename = "DestinationTag", default)]
    pub destination_tag: Option<u64>,
    #[serde(default)]
    pub ledger_index: Option<i64>,
    #[serde(rename = "inLedger", default)]
    pub in_ledger: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawMeta {
    #[serde(rename = "TransactionResult", default)]
    pub transaction_result: Option<String>,
    #[serde(default)]
    pub delivered_amount: Option<RawAmount>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum RawAmount {
    /// Drops, or the literal "unavailable" for old delivered_amount
    Text(String),
    Issued {
        value: String,
        currency: String,
        #[serde(default)]
        issuer: Option<String>,
    },
}

impl RawAmount {
    /// Old ledgers report `delivered_amount: "unavailable"`
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RawAmount::Text(text) if text == "unavailable")
    }

    pub fn parse(self) -> Option<LedgerAmount> {
        match self {
            RawAmount::Text(drops) => drops
                .parse::<u64>()
                .ok()
                .map(|drops| LedgerAmount::Native { drops }),
            RawAmount::Issued {
                value,
                currency,
                issuer,
            } => parse_decimal(&value).map(|value| LedgerAmount::Issued {
                value,
                currency,
                issuer,
            }),
        }
    }
}

/// Issued values may come in scientific notation (`1.5e-3`)
fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawAccountInfo {
    pub account_data: RawAccountData,
    #[serde(default)]
    pub ledger_index: Option<i64>,
    #[serde(default)]
    pub ledger_current_index: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawAccountData {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Balance")]
    pub balance: String,
    #[serde(rename = "Sequence")]
    pub sequence: u64,
}
