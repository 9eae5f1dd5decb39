use std::{sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;

use mcp::{dispatcher::Dispatcher, registry::ToolRegistry, session::SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionStore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: ToolRegistry, sessions: Arc<SessionStore>, tool_timeout: Duration) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(registry), tool_timeout)),
            sessions,
            started_at: Utc::now(),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route("/tools", get(http::handlers::list_tools))
        .route("/status", get(http::handlers::status))
        .route("/sessions", post(http::handlers::create_session))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::domain::tools::builtin_registry;

    use super::*;

    fn state() -> AppState {
        AppState::new(
            builtin_registry(),
            Arc::new(SessionStore::new()),
            Duration::from_secs(5),
        )
    }

    fn mcp_request(session_id: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session_id) = session_id {
            builder = builder.header("mcp-session-id", session_id);
        }
        builder.body(Body::from(body)).expect("request build")
    }

    fn session_id_of(response: &Response) -> Option<String> {
        response
            .headers()
            .get("mcp-session-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    async fn read_json(response: Response) -> Value {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&body).expect("valid json response")
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = build_app(state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(body, "{\"status\":\"ok\"}");
    }

    #[tokio::test]
    async fn discovery_lists_endpoints() {
        let response = build_app(state())
            .oneshot(
                Request::builder()
                    .uri("/.well-known/mcp")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = read_json(response).await;
        assert_eq!(body_json["mcp_endpoint"], "/mcp");
        assert_eq!(body_json["protocol_version"], "2024-11-05");
    }

    #[tokio::test]
    async fn initialize_without_session_creates_one() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(mcp_request(
                None,
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let session_id = session_id_of(&response).expect("session header");
        let body_json = read_json(response).await;

        assert_eq!(body_json["jsonrpc"], "2.0");
        assert_eq!(body_json["id"], 1);
        assert_eq!(body_json["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(
            body_json["result"]["serverInfo"]["name"],
            env!("CARGO_PKG_NAME")
        );
        assert!(body_json["result"]["capabilities"]["tools"].is_object());

        let session = state.sessions.get(&session_id).expect("stored session");
        assert!(session.is_initialized());
    }

    #[tokio::test]
    async fn full_session_flow_over_http() {
        let state = state();
        let app = build_app(state.clone());

        let response = app
            .clone()
            .oneshot(mcp_request(
                None,
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            ))
            .await
            .expect("initialize");
        let session_id = session_id_of(&response).expect("session header");

        let response = app
            .clone()
            .oneshot(mcp_request(
                Some(session_id.as_str()),
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            ))
            .await
            .expect("tools/list");
        assert_eq!(session_id_of(&response).as_deref(), Some(session_id.as_str()));
        let listing = read_json(response).await;
        let tools = listing["result"]["tools"].as_array().expect("tools array");
        assert_eq!(listing["id"], 2);
        assert_eq!(tools.len(), state.dispatcher.registry().len());
        for tool in tools {
            assert!(tool["name"].is_string());
            assert!(tool["description"].is_string());
            assert!(tool["inputSchema"].is_object());
        }

        let response = app
            .clone()
            .oneshot(mcp_request(
                Some(session_id.as_str()),
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"devops_capabilities","arguments":{}}}"#,
            ))
            .await
            .expect("tools/call");
        let call = read_json(response).await;
        assert_eq!(call["id"], 3);
        assert_eq!(call["result"]["content"][0]["type"], "text");
        assert!(call["result"]["content"][0]["text"]
            .as_str()
            .expect("text content")
            .contains("DevOps"));

        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn tools_call_without_name_is_error_and_keeps_session_uninitialized() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(mcp_request(
                Some("fresh-session"),
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"arguments":{}}}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = read_json(response).await;
        assert_eq!(body_json["id"], 4);
        assert!(body_json["error"]["code"].is_i64());
        assert_eq!(body_json["error"]["data"]["code"], "missing_tool_name");
        assert!(body_json.get("result").is_none());

        let session = state.sessions.get("fresh-session").expect("adopted session");
        assert!(!session.is_initialized());
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_names_it() {
        let response = build_app(state())
            .oneshot(mcp_request(
                None,
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"bogus","arguments":{}}}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = read_json(response).await;
        assert_eq!(body_json["id"], 5);
        assert!(body_json["error"]["message"]
            .as_str()
            .expect("message")
            .contains("bogus"));
        assert_eq!(body_json["error"]["data"]["code"], "tool_not_found");
    }

    #[tokio::test]
    async fn unknown_method_returns_error_envelope() {
        let response = build_app(state())
            .oneshot(mcp_request(
                None,
                r#"{"jsonrpc":"2.0","id":"x-1","method":"prompts/list"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = read_json(response).await;
        assert_eq!(body_json["id"], "x-1");
        assert_eq!(body_json["error"]["code"], -32603);
        assert_eq!(body_json["error"]["data"]["code"], "unknown_method");
    }

    #[tokio::test]
    async fn tools_call_invalid_arguments_are_reported() {
        let response = build_app(state())
            .oneshot(mcp_request(
                None,
                r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"generate_k8s_manifest","arguments":{"service_name":"Bad_Name","image":"svc:1"}}}"#,
            ))
            .await
            .expect("request execution");

        let body_json = read_json(response).await;
        assert_eq!(body_json["error"]["data"]["code"], "invalid_arguments");
        assert!(body_json["error"]["message"]
            .as_str()
            .expect("message")
            .contains("service_name"));
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request_without_session() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(mcp_request(None, "{"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(session_id_of(&response).is_none());
        let body_json = read_json(response).await;
        assert_eq!(body_json["error"]["code"], -32700);
        assert!(body_json["id"].is_null());
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn missing_method_is_bad_request() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(mcp_request(Some("known"), r#"{"jsonrpc":"2.0","id":9}"#))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = read_json(response).await;
        assert_eq!(body_json["error"]["code"], -32600);
        assert!(state.sessions.get("known").is_none());
    }

    #[tokio::test]
    async fn null_id_is_bad_request_not_notification() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(mcp_request(
                Some("null-id"),
                r#"{"jsonrpc":"2.0","id":null,"method":"tools/list"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = read_json(response).await;
        assert_eq!(body_json["error"]["code"], -32600);
        assert!(body_json["id"].is_null());
        assert!(state.sessions.get("null-id").is_none());
    }

    #[tokio::test]
    async fn batch_request_is_rejected() {
        let response = build_app(state())
            .oneshot(mcp_request(
                None,
                r#"[{"jsonrpc":"2.0","id":1,"method":"initialize"}]"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_session_header_is_bad_request() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(mcp_request(
                Some("has space"),
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn notification_is_accepted_without_body() {
        let response = build_app(state())
            .oneshot(mcp_request(
                Some("notify-session"),
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(session_id_of(&response).as_deref(), Some("notify-session"));
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn event_stream_framing_when_requested() {
        let response = build_app(state())
            .oneshot(
                Request::builder()
                    .uri("/mcp")
                    .method("POST")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ACCEPT, "text/event-stream")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#))
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_id_of(&response).is_some());
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .expect("content type")
            .starts_with("text/event-stream"));

        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        let text = String::from_utf8(body.to_vec()).expect("utf8 body");
        assert!(text.starts_with("event: message\n"));
        let data = text
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .expect("data line");
        let payload: Value = serde_json::from_str(data).expect("json payload");
        assert_eq!(payload["id"], 7);
        assert!(payload["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn tools_view_matches_registry() {
        let response = build_app(state())
            .oneshot(
                Request::builder()
                    .uri("/tools")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = read_json(response).await;
        assert_eq!(body_json["tools"][0]["name"], "devops_capabilities");
        assert_eq!(body_json["tools"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn status_reports_known_session_without_creating_one() {
        let state = state();
        let app = build_app(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .method("GET")
                    .header("mcp-session-id", "not-yet-known")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        let body_json = read_json(response).await;
        assert_eq!(body_json["sessions"], 0);
        assert_eq!(body_json["tools"], 3);
        assert!(body_json.get("session").is_none());
        assert!(state.sessions.is_empty());

        state.sessions.get_or_create(Some("not-yet-known"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .method("GET")
                    .header("mcp-session-id", "not-yet-known")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        let body_json = read_json(response).await;
        assert_eq!(body_json["sessions"], 1);
        assert_eq!(body_json["session"]["sessionId"], "not-yet-known");
        assert_eq!(body_json["session"]["initialized"], false);
    }

    #[tokio::test]
    async fn create_session_adopts_supplied_id_or_generates_one() {
        let state = state();
        let app = build_app(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/sessions")
                    .method("POST")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let generated = session_id_of(&response).expect("session header");
        let body_json = read_json(response).await;
        assert_eq!(body_json["sessionId"], generated.as_str());
        assert_eq!(body_json["initialized"], false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/sessions")
                    .method("POST")
                    .header("mcp-session-id", "chosen-by-client")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        assert_eq!(
            session_id_of(&response).as_deref(),
            Some("chosen-by-client")
        );
        assert_eq!(state.sessions.len(), 2);
    }

    #[tokio::test]
    async fn root_get_is_not_found() {
        let response = build_app(state())
            .oneshot(
                Request::builder()
                    .uri("/")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
