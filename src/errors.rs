use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_mcp_sdk::schema::RpcError;
use thiserror::Error;

use crate::mcp::rpc::{internal_error, invalid_request, JsonRpcResponse};

/// Failures the transport reports before a request reaches the dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request: {}", .0.message)]
    Malformed(RpcError),
    #[error("invalid Mcp-Session-Id header")]
    InvalidSessionId,
    #[error("internal error")]
    Internal { message: String },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<RpcError> for AppError {
    fn from(error: RpcError) -> Self {
        Self::Malformed(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Malformed(error) => (StatusCode::BAD_REQUEST, error),
            Self::InvalidSessionId => (
                StatusCode::BAD_REQUEST,
                invalid_request(
                    "Mcp-Session-Id must be 1 to 128 visible ASCII characters",
                ),
            ),
            Self::Internal { message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    internal_error("internal_error", "internal server error"),
                )
            }
        };

        (status, Json(JsonRpcResponse::error(None, error))).into_response()
    }
}
