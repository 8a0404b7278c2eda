use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Url};
use tracing::{debug, trace};

use crate::error::{CoreError, RpcError};

use super::super::RpcTransport;
use super::connection::{parse_connection, resolve_auth};
use super::protocol::{parse_jsonrpc_error, render_result, JsonRpcRequest, JsonRpcResponse};

/// bitcoind JSON-RPC transport over HTTP(S).
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    auth: Option<(String, String)>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a transport for `connection` (an `http://` or `https://` URL).
    ///
    /// Authentication precedence:
    /// 1. explicit `user` + `pass`
    /// 2. cookie file (`username:password`) from `cookie_file`
    /// 3. no auth
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        cookie_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let auth = resolve_auth(user, pass, cookie_file)?;
        let url = parse_connection(connection)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CoreError::Config(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            auth,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: &[serde_json::Value]) -> Result<String, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let transport_err = |source: reqwest::Error| {
            if source.is_timeout() {
                RpcError::Timeout {
                    method: method.to_owned(),
                    timeout: self.timeout,
                }
            } else {
                RpcError::Transport {
                    method: method.to_owned(),
                    source,
                }
            }
        };

        let response = builder.send().await.map_err(transport_err)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_err)?;
        debug!(rpc.id = id, rpc.method = method, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        // bitcoind answers RPC-level errors with 500 and a JSON body, so
        // try the body before judging the status code.
        let decoded: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(decoded) => decoded,
            Err(e) if status.is_success() => {
                return Err(RpcError::InvalidResponse {
                    method: method.to_owned(),
                    message: format!("decode JSON-RPC response: {e}"),
                    raw_output: body,
                })
            }
            Err(_) => {
                return Err(RpcError::InvalidResponse {
                    method: method.to_owned(),
                    message: format!("HTTP status {status} without a JSON-RPC body"),
                    raw_output: body,
                })
            }
        };

        if let Some(err) = decoded.error.filter(|e| !e.is_null()) {
            return Err(parse_jsonrpc_error(method, err));
        }

        Ok(render_result(decoded.result))
    }
}
