use thiserror::Error;

use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger node unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Malformed ledger response: {0}")]
    MalformedResponse(String),

    #[error("Ledger node error {code}: {message}")]
    RemoteError { code: i64, message: String },
}

impl From<RpcError> for LedgerError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport(msg) => LedgerError::RemoteUnavailable(msg),
            RpcError::Protocol(msg) => LedgerError::MalformedResponse(msg),
            RpcError::Remote { code, message } => LedgerError::RemoteError { code, message },
        }
    }
}
