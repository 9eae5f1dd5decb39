use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(1_800);
pub const DEFAULT_SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub tool_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("{0} must be a positive number of seconds")]
    InvalidSeconds(&'static str),
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);

        let config = Self {
            bind_addr,
            bind_port,
            session_ttl: seconds_from_env("MCP_SESSION_TTL_SECS")?.unwrap_or(DEFAULT_SESSION_TTL),
            session_sweep_interval: seconds_from_env("MCP_SESSION_SWEEP_SECS")?
                .unwrap_or(DEFAULT_SESSION_SWEEP_INTERVAL),
            tool_timeout: seconds_from_env("MCP_TOOL_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_TOOL_TIMEOUT),
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn seconds_from_env(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    match value.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Some(Duration::from_secs(seconds))),
        _ => Err(ConfigError::InvalidSeconds(name)),
    }
}
