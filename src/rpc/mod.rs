//! JSON-RPC 1.0 transport to the ledger node
//!
//! [`RpcTransport`] is the seam the ledger adapter talks through.
//! [`HttpRpcClient`] is the production implementation (HTTP(S) + basic auth);
//! [`MockTransport`] replays scripted responses for tests and local runs.

pub mod client;
pub mod error;
pub mod mock;

pub use client::{HttpRpcClient, RpcTransport, decode_response};
pub use error::RpcError;
pub use mock::MockTransport;
