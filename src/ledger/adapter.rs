use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::LedgerError;
use super::types::{
    AccountInfo, AccountTxPage, AccountTxParams, LedgerTransaction, RawAccountInfo, RawAccountTx,
    RawTxEntry,
};
use crate::rpc::RpcTransport;

/// Typed access to the ledger node. The transport is injected; there is no shared client.
#[derive(Clone)]
pub struct LedgerClient {
    transport: Arc<dyn RpcTransport>,
}

impl LedgerClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    /// `account_info`: verify an account exists and read its balance
    pub async fn account_info(&self, account: &str) -> Result<AccountInfo, LedgerError> {
        let result = self
            .transport
            .call("account_info", vec![json!({ "account": account })])
            .await?;
        parse_account_info(result)
    }

    /// `account_tx`: transaction history of an account within a ledger range
    pub async fn account_transactions(
        &self,
        params: &AccountTxParams,
    ) -> Result<AccountTxPage, LedgerError> {
        let param = serde_json::to_value(params)
            .map_err(|e| LedgerError::MalformedResponse(format!("unencodable params: {}", e)))?;
        let result = self.transport.call("account_tx", vec![param]).await?;
        parse_account_tx(result)
    }

    /// `account_tx` across pages: follows `marker` until the node has no more,
    /// or `max_pages` pages were read. In the latter case the returned page
    /// keeps the last marker so the caller knows the history is incomplete.
    pub async fn account_history(
        &self,
        params: &AccountTxParams,
        max_pages: usize,
    ) -> Result<AccountTxPage, LedgerError> {
        let mut merged = self.account_transactions(params).await?;
        let mut pages = 1;

        while let Some(marker) = merged.marker.take() {
            if pages >= max_pages {
                warn!(
                    "{}: account_tx still truncated after {} pages",
                    params.account, pages
                );
                merged.marker = Some(marker);
                break;
            }

            debug!("{}: fetching account_tx page {}", params.account, pages + 1);
            let next = self.account_transactions(&params.resume_at(marker)).await?;
            pages += 1;

            if next.status != "success" {
                // A broken page invalidates the whole history read
                merged.status = next.status;
                merged.transactions.clear();
                break;
            }
            merged.ledger_index_max = merged.ledger_index_max.max(next.ledger_index_max);
            merged.transactions.extend(next.transactions);
            merged.skipped += next.skipped;
            merged.marker = next.marker;
        }

        Ok(merged)
    }
}

/// rippled reports application errors inside `result` rather than the envelope
fn check_node_error(result: &Value) -> Result<(), LedgerError> {
    let Some(token) = result.get("error").and_then(Value::as_str) else {
        return Ok(());
    };
    let code = result
        .get("error_code")
        .and_then(Value::as_i64)
        .unwrap_or(-1);
    let message = match result.get("error_message").and_then(Value::as_str) {
        Some(detail) => format!("{}: {}", token, detail),
        None => token.to_string(),
    };
    Err(LedgerError::RemoteError { code, message })
}

fn decode<T: DeserializeOwned>(result: Value, what: &str) -> Result<T, LedgerError> {
    serde_json::from_value(result)
        .map_err(|e| LedgerError::MalformedResponse(format!("{}: {}", what, e)))
}

pub(crate) fn parse_account_info(result: Value) -> Result<AccountInfo, LedgerError> {
    check_node_error(&result)?;
    let raw: RawAccountInfo = decode(result, "account_info")?;
    let balance_drops = raw.account_data.balance.parse::<u64>().map_err(|e| {
        LedgerError::MalformedResponse(format!(
            "account_info: bad Balance {:?}: {}",
            raw.account_data.balance, e
        ))
    })?;

    Ok(AccountInfo {
        account: raw.account_data.account,
        balance_drops,
        sequence: raw.account_data.sequence,
        ledger_index: raw.ledger_index.or(raw.ledger_current_index),
    })
}

pub(crate) fn parse_account_tx(result: Value) -> Result<AccountTxPage, LedgerError> {
    check_node_error(&result)?;
    let raw: RawAccountTx = decode(result, "account_tx")?;

    let status = raw
        .status
        .ok_or_else(|| LedgerError::MalformedResponse("account_tx: missing status".into()))?;

    if status != "success" {
        // The caller aborts the pass; nothing else is read.
        return Ok(AccountTxPage {
            status,
            ledger_index_min: raw.ledger_index_min,
            ledger_index_max: raw.ledger_index_max.unwrap_or(-1),
            transactions: Vec::new(),
            marker: None,
            skipped: 0,
        });
    }

    let ledger_index_max = raw.ledger_index_max.ok_or_else(|| {
        LedgerError::MalformedResponse("account_tx: missing ledger_index_max".into())
    })?;

    let mut transactions = Vec::new();
    let mut skipped = 0;
    for entry in raw.transactions.unwrap_or_default() {
        let converted = serde_json::from_value::<RawTxEntry>(entry)
            .map_err(|e| LedgerError::MalformedResponse(format!("account_tx entry: {}", e)))
            .and_then(convert_entry);
        match converted {
            Ok(Some(tx)) => transactions.push(tx),
            Ok(None) => {}
            Err(e) => {
                warn!("Skipping unreadable account_tx entry: {}", e);
                skipped += 1;
            }
        }
    }

    Ok(AccountTxPage {
        status,
        ledger_index_min: raw.ledger_index_min,
        ledger_index_max,
        transactions,
        marker: raw.marker.filter(|m| !m.is_null()),
        skipped,
    })
}

/// `Ok(None)` for entries that move no funds (no amount field)
fn convert_entry(entry: RawTxEntry) -> Result<Option<LedgerTransaction>, LedgerError> {
    let RawTxEntry {
        tx,
        tx_json,
        meta,
        hash: entry_hash,
        ledger_index: entry_ledger_index,
        validated,
    } = entry;

    let tx = tx
        .or(tx_json)
        .ok_or_else(|| LedgerError::MalformedResponse("account_tx: entry without tx".into()))?;

    let hash = tx
        .hash
        .or(entry_hash)
        .ok_or_else(|| LedgerError::MalformedResponse("account_tx: tx without hash".into()))?;

    let ledger_index = tx
        .ledger_index
        .or(tx.in_ledger)
        .or(entry_ledger_index)
        .ok_or_else(|| {
            LedgerError::MalformedResponse(format!("account_tx: tx {} without ledger index", hash))
        })?;

    let (result, delivered) = match meta {
        Some(meta) => (meta.transaction_result, meta.delivered_amount),
        None => (None, None),
    };
    let delivered = match delivered {
        Some(raw) if !raw.is_unavailable() => Some(raw.parse().ok_or_else(|| {
            LedgerError::MalformedResponse(format!(
                "account_tx: tx {} has a bad delivered_amount",
                hash
            ))
        })?),
        _ => None,
    };

    // delivered_amount is authoritative: partial payments deliver less than Amount
    let amount = match (delivered, tx.amount.or(tx.deliver_max)) {
        (Some(delivered), _) => delivered,
        (None, Some(raw)) => raw.parse().ok_or_else(|| {
            LedgerError::MalformedResponse(format!("account_tx: tx {} has a bad Amount", hash))
        })?,
        (None, None) => {
            debug!("Skipping {} tx {} without amount", tx.transaction_type, hash);
            return Ok(None);
        }
    };

    Ok(Some(LedgerTransaction {
        hash,
        account: tx.account,
        destination: tx.destination,
        amount,
        destination_tag: tx.destination_tag,
        ledger_index,
        transaction_type: tx.transaction_type,
        validated,
        result,
    }))
}
