use thiserror::Error;

/// Failures of a single JSON-RPC round trip
#[derive(Debug, Error)]
pub enum RpcError {
    /// Network, TLS or HTTP-level failure; the node could not be reached
    #[error("JSON-RPC transport error: {0}")]
    Transport(String),

    /// Malformed envelope, empty body or mismatched response id
    #[error("JSON-RPC protocol error: {0}")]
    Protocol(String),

    /// Non-null `error` in the response envelope
    #[error("JSON-RPC error {code}: {message}")]
    Remote { code: i64, message: String },
}
