//! JSON-RPC 2.0 envelopes and error codes
//!
//! The transport decodes bodies into a [`JsonRpcRequest`]; every reply leaves the
//! dispatcher as a [`JsonRpcResponse`] carrying the caller's id.

use rust_mcp_sdk::schema::{RequestId, RpcError, RpcErrorCodes};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent means notification; an explicit `null` is rejected.
    #[serde(default, deserialize_with = "present_request_id")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

fn present_request_id<'de, D>(deserializer: D) -> Result<Option<RequestId>, D::Error>
where
    D: Deserializer<'de>,
{
    RequestId::deserialize(deserializer).map(Some)
}

pub fn parse_error() -> RpcError {
    RpcError::new(RpcErrorCodes::PARSE_ERROR, "Parse error".to_string(), None)
}

pub fn invalid_request(detail: &str) -> RpcError {
    RpcError::new(
        RpcErrorCodes::INVALID_REQUEST,
        "Invalid Request".to_string(),
        Some(json!({
            "code": "invalid_request",
            "message": detail,
        })),
    )
}

/// Generic internal error with a machine-readable kind in `data.code`.
pub fn internal_error(kind: &'static str, message: impl Into<String>) -> RpcError {
    RpcError::new(
        RpcErrorCodes::INTERNAL_ERROR,
        message.into(),
        Some(json!({ "code": kind })),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Decodes one HTTP body into a request, rejecting anything that is not a
/// single well-formed JSON-RPC 2.0 message.
pub fn decode_request(body: &[u8]) -> Result<JsonRpcRequest, RpcError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|_| parse_error())?;

    if payload.is_array() {
        return Err(invalid_request(
            "batch requests are not supported",
        ));
    }

    if !payload.is_object() {
        return Err(invalid_request(
            "request must be a JSON object",
        ));
    }

    let request: JsonRpcRequest = serde_json::from_value(payload).map_err(|_| {
        invalid_request("request must carry jsonrpc, method and a string or integer id")
    })?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(invalid_request("jsonrpc must be \"2.0\""));
    }

    if request.method.trim().is_empty() {
        return Err(invalid_request("method must not be empty"));
    }

    Ok(request)
}
