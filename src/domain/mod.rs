//! Built-in tools exposed over the Model Context Protocol
//!
//! Handlers are opaque to the dispatcher; they only share the
//! [`crate::mcp::registry::ToolHandler`] contract.

pub mod tools;
pub mod utils;
