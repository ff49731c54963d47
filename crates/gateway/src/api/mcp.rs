//! `POST /mcp/message` — the single JSON-RPC 2.0 entrypoint.
//!
//! Parses the envelope by hand (rather than via axum's `Json` extractor)
//! so malformed bodies get a proper JSON-RPC parse error instead of an
//! axum rejection.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use portero_core::error::Error;

use crate::state::AppState;

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const APPLICATION_ERROR: i32 = -32000;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct JsonRpcErrorBody {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcErrorBody { code, message: message.into() }),
        }
    }
}

/// Map a pipeline [`Error`] onto a JSON-RPC error code. Policy denial is an
/// application-level rejection, not an internal failure; missing params and
/// unknown methods get their standard JSON-RPC codes.
fn error_code(e: &Error) -> i32 {
    match e {
        Error::PolicyDenied(_) => APPLICATION_ERROR,
        Error::Auth(_) => APPLICATION_ERROR,
        Error::Other(msg) if msg.starts_with("method not found") => METHOD_NOT_FOUND,
        Error::Other(msg) if msg.starts_with("missing params") => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    }
}

pub async fn mcp_message(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {e}")));
        }
    };

    let id = request.id.clone();
    let response = dispatch(&state, &request).await;
    Json(match response {
        Ok(result) => JsonRpcResponse::ok(id, result),
        Err(e) => JsonRpcResponse::err(id, error_code(&e), e.to_string()),
    })
}

async fn dispatch(state: &AppState, request: &JsonRpcRequest) -> Result<Value, Error> {
    match request.method.as_str() {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": { "name": "portero", "version": env!("CARGO_PKG_VERSION") },
        })),
        "ping" => Ok(serde_json::json!({})),
        method if method.starts_with("notifications/") => Ok(serde_json::json!({})),
        "tools/list" => {
            let tools = state.pipeline.list_tools();
            Ok(serde_json::json!({ "tools": tools }))
        }
        "resources/list" => {
            let backend_id = request
                .params
                .get("backend_id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Other("missing params.backend_id".into()))?;
            state.pipeline.list_resources(backend_id).await
        }
        "resources/read" => {
            let uri = request
                .params
                .get("uri")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Other("missing params.uri".into()))?;
            state.pipeline.read_resource(uri).await
        }
        "tools/call" => {
            let name = request
                .params
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Other("missing params.name".into()))?;
            let arguments = request.params.get("arguments").cloned().unwrap_or(Value::Null);
            state.pipeline.call_tool(name, arguments).await
        }
        other => Err(Error::Other(format!("method not found: {other}"))),
    }
}
