use std::sync::Arc;

use devops_mcp_server::{
    build_app,
    config::Config,
    domain::tools::builtin_registry,
    logging,
    mcp::session::{spawn_session_reaper, SessionStore},
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;

    let registry = builtin_registry();
    let tool_count = registry.len();
    let sessions = Arc::new(SessionStore::new());
    let _reaper = spawn_session_reaper(
        Arc::clone(&sessions),
        config.session_ttl,
        config.session_sweep_interval,
    );

    let state = AppState::new(registry, sessions, config.tool_timeout);
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        tools = tool_count,
        session_ttl_secs = config.session_ttl.as_secs(),
        tool_timeout_secs = config.tool_timeout.as_secs(),
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
