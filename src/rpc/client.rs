use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::error::RpcError;
use crate::config::LedgerRpcConfig;

/// A generic JSON-RPC call: method name plus positional params
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// JSON-RPC 1.0 request envelope
#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

/// JSON-RPC response envelope. rippled omits `id`, other servers echo it.
#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Decode a raw response body for request `request_id`.
pub fn decode_response(request_id: u64, body: &[u8]) -> Result<Value, RpcError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(RpcError::Protocol(
            "no data; check the ledger JSON-RPC settings".to_string(),
        ));
    }

    let response: JsonRpcResponse = serde_json::from_slice(body)
        .map_err(|e| RpcError::Protocol(format!("undecodable response: {}", e)))?;

    if let Some(id) = response.id.as_ref().filter(|id| !id.is_null())
        && !id_matches(id, request_id)
    {
        return Err(RpcError::Protocol(format!(
            "incorrect response id: expected {}, got {}",
            request_id, id
        )));
    }

    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        return Err(remote_error(error));
    }

    response
        .result
        .ok_or_else(|| RpcError::Protocol("no result in response".to_string()))
}

fn id_matches(id: &Value, expected: u64) -> bool {
    match id {
        Value::Number(n) => n.as_u64() == Some(expected),
        Value::String(s) => s == &expected.to_string(),
        _ => false,
    }
}

fn remote_error(error: Value) -> RpcError {
    match error {
        Value::Object(ref map) => RpcError::Remote {
            code: map.get("code").and_then(Value::as_i64).unwrap_or(-1),
            message: map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        },
        Value::String(message) => RpcError::Remote { code: -1, message },
        other => RpcError::Remote {
            code: -1,
            message: other.to_string(),
        },
    }
}

/// JSON-RPC 1.0 client over HTTP(S)
pub struct HttpRpcClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Build a client for the configured ledger node
    pub fn new(config: &LedgerRpcConfig) -> Result<Self, RpcError> {
        info!("Initializing ledger JSON-RPC client at {}", config.endpoint());
        Self::with_endpoint(config.endpoint(), config.credentials(), config.timeout())
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            credentials,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            id,
            method,
            params,
        };

        debug!("JSON-RPC -> {} (id {})", method, id);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some((user, pass)) = &self.credentials {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(format!("Failed to read response: {}", e)))?;

        match decode_response(id, &body) {
            Err(RpcError::Protocol(_)) if !status.is_success() => Err(RpcError::Transport(
                format!("ledger node answered HTTP {}", status),
            )),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_result() {
        let body = br#"{"result": {"status": "success"}, "id": 3, "error": null}"#;
        let result = decode_response(3, body).unwrap();
        assert_eq!(result["status"], "success");
    }

    #[test]
    fn test_decode_without_id() {
        let body = br#"{"result": {"status": "success"}}"#;
        assert!(decode_response(9, body).is_ok());
    }

    #[test]
    fn test_decode_rejects_mismatched_id() {
        let body = br#"{"result": {}, "id": 2, "error": null}"#;
        let err = decode_response(1, body).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn test_decode_string_id() {
        let body = br#"{"result": {}, "id": "7"}"#;
        assert!(decode_response(7, body).is_ok());
    }

    #[test]
    fn test_decode_remote_error() {
        let body = br#"{"result": null, "id": 1, "error": {"code": -32601, "message": "Method not found"}}"#;
        match decode_response(1, body).unwrap_err() {
            RpcError::Remote { code, message } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(matches!(
            decode_response(1, b"  ").unwrap_err(),
            RpcError::Protocol(_)
        ));
        assert!(matches!(
            decode_response(1, b"<html>").unwrap_err(),
            RpcError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn test_http_call_sends_json_rpc_1_0_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(body_partial_json(json!({
                "jsonrpc": "1.0",
                "id": 1,
                "method": "account_info",
                "params": [{"account": "rTest"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"status": "success"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpRpcClient::with_endpoint(
            server.uri(),
            Some(("user".to_string(), "pass".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = client
            .call("account_info", vec![json!({"account": "rTest"})])
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
    }

    #[tokio::test]
    async fn test_http_call_increments_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"id": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"n": 2}, "id": 2, "error": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"id": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"n": 1}, "id": 1, "error": null
            })))
            .mount(&server)
            .await;

        let client =
            HttpRpcClient::with_endpoint(server.uri(), None, Duration::from_secs(5)).unwrap();

        assert_eq!(client.call("ping", vec![]).await.unwrap()["n"], 1);
        assert_eq!(client.call("ping", vec![]).await.unwrap()["n"], 2);
    }

    #[tokio::test]
    async fn test_http_error_status_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client =
            HttpRpcClient::with_endpoint(server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = client.call("account_tx", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_failure() {
        let client = HttpRpcClient::with_endpoint(
            "http://127.0.0.1:1/",
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.call("account_tx", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
