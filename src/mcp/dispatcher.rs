//! The central Model Context Protocol engine
//!
//! Runs the per-session method state machine: `initialize` marks a session
//! ready, `tools/list` and `tools/call` auto-initialize it, and every outcome
//! is folded into a JSON-RPC envelope carrying the request id.

use std::{sync::Arc, time::Duration};

use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ProtocolVersion, RequestId, RpcError, ServerCapabilities,
    ServerCapabilitiesTools,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::mcp::{
    registry::{ToolError, ToolRegistry},
    rpc::{internal_error, JsonRpcResponse},
    session::Session,
};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Missing tool name: tools/call requires params.name")]
    MissingToolName,
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("Invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("Tool {tool} failed: {message}")]
    ToolFailed { tool: String, message: String },
    #[error("Tool {tool} timed out after {}ms", .after.as_millis())]
    ToolTimeout { tool: String, after: Duration },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownMethod(_) => "unknown_method",
            Self::MissingToolName => "missing_tool_name",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::ToolFailed { .. } => "tool_failed",
            Self::ToolTimeout { .. } => "tool_timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    fn from_tool(tool: &str, error: ToolError) -> Self {
        match error {
            ToolError::InvalidArguments(message) => Self::InvalidArguments {
                tool: tool.to_string(),
                message,
            },
            ToolError::Failed(message) => Self::ToolFailed {
                tool: tool.to_string(),
                message,
            },
        }
    }

    pub fn to_rpc_error(&self) -> RpcError {
        internal_error(self.kind(), self.to_string())
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            registry,
            tool_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        session: &Session,
        id: RequestId,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let audit_params = redact_audit_params(params.as_ref());

        let outcome = match method {
            "initialize" => self.initialize(session, params.as_ref()),
            "tools/list" => self.list_tools(session),
            "tools/call" => self.call_tool(session, params).await,
            _ => Err(DispatchError::UnknownMethod(method.to_string())),
        };

        let response = match outcome {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(err) => {
                warn!(
                    session_id = %session.id(),
                    method = %method,
                    kind = err.kind(),
                    error = %err,
                    "mcp request failed"
                );
                JsonRpcResponse::error(Some(id), err.to_rpc_error())
            }
        };

        info!(
            session_id = %session.id(),
            method = %method,
            params = %audit_params,
            outcome = if response.is_error() { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    /// Notifications never produce a response body and never run tools.
    pub fn notify(&self, session: &Session, method: &str) {
        match method {
            "notifications/initialized" => {
                debug!(session_id = %session.id(), "client reported initialized")
            }
            _ => debug!(session_id = %session.id(), method = %method, "notification ignored"),
        }
    }

    fn initialize(&self, session: &Session, params: Option<&Value>) -> Result<Value, DispatchError> {
        let protocol_version = negotiate_protocol_version(params);
        if session.mark_initialized() {
            info!(session_id = %session.id(), "session initialized");
        }

        let initialize_result = InitializeResult {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools { list_changed: None }),
                resources: None,
                prompts: None,
                ..Default::default()
            },
            protocol_version: protocol_version.into(),
            instructions: None,
            meta: None,
        };

        serde_json::to_value(initialize_result)
            .map_err(|err| DispatchError::Internal(format!("initialize result: {err}")))
    }

    fn list_tools(&self, session: &Session) -> Result<Value, DispatchError> {
        auto_initialize(session);
        serde_json::to_value(self.registry.list_response())
            .map_err(|err| DispatchError::Internal(format!("tools list result: {err}")))
    }

    async fn call_tool(
        &self,
        session: &Session,
        params: Option<Value>,
    ) -> Result<Value, DispatchError> {
        let mut params = match params {
            Some(Value::Object(map)) => map,
            _ => return Err(DispatchError::MissingToolName),
        };

        let name = match params.remove("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => return Err(DispatchError::MissingToolName),
        };

        auto_initialize(session);

        let tool = self
            .registry
            .get(&name)
            .ok_or_else(|| DispatchError::ToolNotFound(name.clone()))?;

        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => {
                return Err(DispatchError::InvalidArguments {
                    tool: name,
                    message: "arguments must be a JSON object".to_string(),
                })
            }
        };

        let handler = Arc::clone(&tool.handler);
        let mut task = AbortOnDrop(tokio::spawn(async move { handler.call(arguments).await }));

        let result = match tokio::time::timeout(self.tool_timeout, &mut task.0).await {
            Ok(Ok(result)) => result.map_err(|err| DispatchError::from_tool(&name, err))?,
            Ok(Err(join_error)) => {
                return Err(DispatchError::ToolFailed {
                    tool: name,
                    message: if join_error.is_panic() {
                        "handler panicked".to_string()
                    } else {
                        "handler was cancelled".to_string()
                    },
                })
            }
            Err(_) => {
                return Err(DispatchError::ToolTimeout {
                    tool: name,
                    after: self.tool_timeout,
                })
            }
        };

        serde_json::to_value(result)
            .map_err(|err| DispatchError::Internal(format!("tool result for {name}: {err}")))
    }
}

/// Aborts the handler task when the call returns or the caller goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn auto_initialize(session: &Session) {
    if session.mark_initialized() {
        debug!(session_id = %session.id(), "session auto-initialized");
    }
}

/// The server speaks one protocol version; a different client offer is
/// answered with it rather than rejected.
pub fn negotiate_protocol_version(params: Option<&Value>) -> ProtocolVersion {
    let offered = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty());

    if let Some(offered) = offered {
        if offered != SUPPORTED_PROTOCOL_VERSION {
            debug!(
                offered = %offered,
                supported = SUPPORTED_PROTOCOL_VERSION,
                "client offered a different protocol version"
            );
        }
    }

    ProtocolVersion::V2024_11_05
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "private_key"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
