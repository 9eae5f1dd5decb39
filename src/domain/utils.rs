//! Argument extraction and validation shared by the built-in tools

use std::sync::LazyLock;

use regex::Regex;
use rust_mcp_sdk::schema::{CallToolResult, ContentBlock, TextContent};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::mcp::registry::ToolError;

pub const MAX_DNS_LABEL_LEN: usize = 63;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));

pub fn parse_arguments<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|err| ToolError::invalid(err.to_string()))
}

pub fn normalize_choice(field: &str, value: &str, allowed: &[&str]) -> Result<String, ToolError> {
    let normalized = value.trim().to_ascii_lowercase();
    if allowed.contains(&normalized.as_str()) {
        return Ok(normalized);
    }

    Err(ToolError::invalid(format!(
        "{field} must be one of: {}",
        allowed.join(", ")
    )))
}

pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<String, ToolError> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();
    if length < min || length > max {
        return Err(ToolError::invalid(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }

    Ok(trimmed.to_string())
}

/// Kubernetes object names: lowercase RFC 1123 labels.
pub fn validate_dns_label(field: &str, value: &str) -> Result<String, ToolError> {
    let label = validate_length(field, value, 1, MAX_DNS_LABEL_LEN)?;
    if !DNS_LABEL.is_match(&label) {
        return Err(ToolError::invalid(format!(
            "{field} must contain only lowercase alphanumeric characters or '-', and start and end with an alphanumeric character"
        )));
    }

    Ok(label)
}

pub fn validate_range(field: &str, value: i64, min: i64, max: i64) -> Result<i64, ToolError> {
    if value < min || value > max {
        return Err(ToolError::invalid(format!(
            "{field} must be between {min} and {max}"
        )));
    }

    Ok(value)
}

pub fn text_result(text: String, structured: Option<Map<String, Value>>) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: None,
        meta: None,
        structured_content: structured,
    }
}
