use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::client::RpcTransport;
use super::error::RpcError;

/// Scripted transport: replays queued responses in order and records every call.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Value, RpcError>>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful `result` payload
    pub fn push_result(&self, result: Value) {
        self.lock_responses().push_back(Ok(result));
    }

    /// Queue a failure
    pub fn push_error(&self, error: RpcError) {
        self.lock_responses().push_back(Err(error));
    }

    /// Calls made so far, as (method, params)
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Value, RpcError>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((method.to_string(), params));

        self.lock_responses().pop_front().unwrap_or_else(|| {
            Err(RpcError::Transport(
                "no scripted response left (mock transport)".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_in_order_and_records_calls() {
        let mock = MockTransport::new();
        mock.push_result(json!({"n": 1}));
        mock.push_error(RpcError::Transport("down".into()));

        assert_eq!(mock.call("a", vec![json!(1)]).await.unwrap()["n"], 1);
        assert!(mock.call("b", vec![]).await.is_err());
        assert!(matches!(
            mock.call("c", vec![]).await.unwrap_err(),
            RpcError::Transport(_)
        ));

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, "a");
        assert_eq!(calls[0].1, vec![json!(1)]);
    }
}
