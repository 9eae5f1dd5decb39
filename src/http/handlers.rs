//! Axum HTTP handlers for the web server
//!
//! `POST /mcp` is the JSON-RPC entry point. The remaining routes are
//! read-only views over the same registry and session store, plus explicit
//! session creation. Every route adopts a caller-supplied session id.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use axum_extra::{headers::HeaderMapExt, TypedHeader};
use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::http::session_header::McpSessionId;
use crate::mcp::{
    dispatcher::SUPPORTED_PROTOCOL_VERSION,
    rpc::decode_request,
    session::{Session, SessionSnapshot},
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub protocol_version: &'static str,
    pub mcp_endpoint: &'static str,
    pub tools_endpoint: &'static str,
    pub status_endpoint: &'static str,
    pub sessions_endpoint: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub protocol_version: &'static str,
    pub tools: usize,
    pub sessions: usize,
    pub uptime_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSnapshot>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: SUPPORTED_PROTOCOL_VERSION,
        mcp_endpoint: "/mcp",
        tools_endpoint: "/tools",
        status_endpoint: "/status",
        sessions_endpoint: "/sessions",
    })
}

pub async fn mcp_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = decode_request(&body)?;
    let requested = requested_session_id(&headers)?;
    let session = state
        .sessions
        .get_or_create(requested.as_ref().map(McpSessionId::as_str));
    let echoed = session_header(&session)?;

    let Some(id) = request.id else {
        state.dispatcher.notify(&session, &request.method);
        return Ok((StatusCode::ACCEPTED, echoed).into_response());
    };

    let response = state
        .dispatcher
        .dispatch(&session, id, &request.method, request.params)
        .await;

    if wants_event_stream(&headers) {
        let event = Event::default()
            .event("message")
            .json_data(&response)
            .map_err(|err| AppError::internal(format!("sse encoding failed: {err}")))?;
        let stream = tokio_stream::once(Ok::<Event, Infallible>(event));
        return Ok((echoed, Sse::new(stream)).into_response());
    }

    Ok((StatusCode::OK, echoed, Json(response)).into_response())
}

pub async fn list_tools(State(state): State<AppState>) -> Response {
    Json(state.dispatcher.registry().list_response()).into_response()
}

/// Does not create a session; reports the caller's session only when known.
pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    let session = requested_session_id(&headers)?
        .and_then(|requested| state.sessions.get(requested.as_str()))
        .map(|session| session.snapshot());

    Ok(Json(StatusResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: SUPPORTED_PROTOCOL_VERSION,
        tools: state.dispatcher.registry().len(),
        sessions: state.sessions.len(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        session,
    }))
}

pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let requested = requested_session_id(&headers)?;
    let session = state
        .sessions
        .get_or_create(requested.as_ref().map(McpSessionId::as_str));

    Ok((
        StatusCode::OK,
        session_header(&session)?,
        Json(session.snapshot()),
    )
        .into_response())
}

fn requested_session_id(headers: &HeaderMap) -> Result<Option<McpSessionId>, AppError> {
    headers
        .typed_try_get::<McpSessionId>()
        .map_err(|_| AppError::InvalidSessionId)
}

fn session_header(session: &Session) -> Result<TypedHeader<McpSessionId>, AppError> {
    McpSessionId::new(session.id())
        .map(TypedHeader)
        .ok_or_else(|| AppError::internal("session id is not a valid header value"))
}

/// SSE framing is used only when the client accepts an event stream and not plain JSON.
pub fn wants_event_stream(headers: &HeaderMap) -> bool {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    accept.contains("text/event-stream") && !accept.contains("application/json")
}
