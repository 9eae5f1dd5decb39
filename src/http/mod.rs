//! HTTP transport layer for the Model Context Protocol
//!
//! Routes, the typed `Mcp-Session-Id` header and response framing.

pub mod handlers;
pub mod session_header;
