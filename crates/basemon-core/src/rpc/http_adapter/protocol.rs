use crate::error::RpcError;

#[derive(serde::Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    pub(super) jsonrpc: &'static str,
    pub(super) id: u64,
    pub(super) method: &'a str,
    pub(super) params: &'a [serde_json::Value],
}

#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponse {
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

/// Parse a JSON-RPC error value into a structured `RpcError`.
///
/// Errors shaped like `{"code": <int>, "message": <string>}` become
/// `Server`; anything else is kept verbatim as `InvalidResponse`.
pub(super) fn parse_jsonrpc_error(method: &str, err: serde_json::Value) -> RpcError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) => RpcError::Server {
            method: method.to_owned(),
            code: parsed.code,
            message: parsed.message,
        },
        Err(_) => RpcError::InvalidResponse {
            method: method.to_owned(),
            message: "non-standard JSON-RPC error".to_owned(),
            raw_output: err.to_string(),
        },
    }
}

/// Render a JSON-RPC result the way `bitcoin-cli` prints it: strings
/// unquoted, `null` as nothing, everything else as JSON text.
pub(super) fn render_result(result: Option<serde_json::Value>) -> String {
    match result {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}
