use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::RpcError;

use super::{RpcClient, RpcTransport};

type Scripted = Result<String, (i32, String)>;

/// A scripted RPC transport for tests.
///
/// Responses are keyed by method, or by `method firstparam` for calls such
/// as `getblock <hash>`; the keyed form wins when both exist. Each key holds
/// a queue: responses are consumed in order and the last one repeats.
/// Unscripted methods fail like `bitcoin-cli` does for an unknown method.
pub struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            responses: HashMap::new(),
        }
    }

    /// Every call made so far, as `method` or `method firstparam`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }
}

pub struct MockTransportBuilder {
    responses: HashMap<String, VecDeque<Scripted>>,
}

impl MockTransportBuilder {
    fn push(mut self, key: &str, response: Scripted) -> Self {
        self.responses
            .entry(key.to_owned())
            .or_default()
            .push_back(response);
        self
    }

    pub fn respond(self, key: &str, value: serde_json::Value) -> Self {
        self.push(key, Ok(value.to_string()))
    }

    pub fn respond_raw(self, key: &str, text: &str) -> Self {
        self.push(key, Ok(text.to_owned()))
    }

    pub fn fail(self, key: &str, exit_status: i32, output: &str) -> Self {
        self.push(key, Err((exit_status, output.to_owned())))
    }

    pub fn build(self) -> Arc<MockTransport> {
        Arc::new(MockTransport {
            responses: Mutex::new(self.responses),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn build_client(self) -> RpcClient {
        RpcClient::new(self.build())
    }
}

fn param_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, method: &str, params: &[serde_json::Value]) -> Result<String, RpcError> {
        let keyed = params
            .first()
            .map(|p| format!("{method} {}", param_text(p)));
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(keyed.clone().unwrap_or_else(|| method.to_owned()));

        let mut responses = self.responses.lock().expect("mock responses poisoned");
        let key = match keyed {
            Some(ref keyed) if responses.contains_key(keyed) => Some(keyed.clone()),
            _ if responses.contains_key(method) => Some(method.to_owned()),
            _ => None,
        };
        let queue = match key {
            Some(key) => responses.get_mut(&key),
            None => None,
        };

        let scripted = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match scripted {
            Some(Ok(text)) => Ok(text),
            Some(Err((exit_status, raw_output))) => Err(RpcError::Exit {
                method: method.to_owned(),
                exit_status,
                raw_output,
            }),
            None => Err(RpcError::Exit {
                method: method.to_owned(),
                exit_status: 89,
                raw_output: format!("error code: -32601\nerror message:\nMethod not found: {method}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_are_consumed_then_last_repeats() {
        let mock = MockTransport::builder()
            .fail("getblockchaininfo", 28, "Loading block index...")
            .respond_raw("getblockchaininfo", "{}")
            .build();

        assert!(mock.call("getblockchaininfo", &[]).await.is_err());
        assert_eq!(mock.call("getblockchaininfo", &[]).await.unwrap(), "{}");
        assert_eq!(mock.call("getblockchaininfo", &[]).await.unwrap(), "{}");
        assert_eq!(mock.call_count("getblockchaininfo"), 3);
    }

    #[tokio::test]
    async fn keyed_response_overrides_method_default() {
        let mock = MockTransport::builder()
            .respond_raw("getrawtransaction", "default")
            .respond_raw("getrawtransaction aa", "keyed")
            .build();

        let keyed = mock
            .call("getrawtransaction", &[serde_json::json!("aa"), serde_json::json!(1)])
            .await
            .unwrap();
        let fallback = mock
            .call("getrawtransaction", &[serde_json::json!("bb"), serde_json::json!(1)])
            .await
            .unwrap();
        assert_eq!(keyed, "keyed");
        assert_eq!(fallback, "default");
        assert_eq!(mock.calls(), vec!["getrawtransaction aa", "getrawtransaction bb"]);
    }

    #[tokio::test]
    async fn unscripted_method_fails() {
        let mock = MockTransport::builder().build();
        let err = mock.call("getpeerinfo", &[]).await.expect_err("must fail");
        assert!(err.to_string().contains("Method not found"));
    }
}
