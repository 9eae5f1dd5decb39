//! Typed `Mcp-Session-Id` header

use axum::http::{HeaderName, HeaderValue};
use axum_extra::headers::{self, Header};

pub static MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");

pub const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque session token. Accepted from clients when it is 1..=128 visible
/// ASCII characters; never parsed further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpSessionId(String);

impl McpSessionId {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        is_valid_token(&token).then_some(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_SESSION_ID_LEN
        && token.bytes().all(|byte| byte.is_ascii_graphic())
}

impl Header for McpSessionId {
    fn name() -> &'static HeaderName {
        &MCP_SESSION_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let token = value.to_str().map_err(|_| headers::Error::invalid())?.trim();
        Self::new(token).ok_or_else(headers::Error::invalid)
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}
