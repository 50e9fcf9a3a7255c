//! Cookie bundle parsing
//!
//! Browser cookie exports are JSON objects mapping cookie names to values.
//! Some entries cannot be sent as a `Cookie:` header (Google sign-in state,
//! values that embed JSON) and are dropped before the header is built.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::{HarvestError, Result};

/// Cookie names that never survive header encoding
const INCOMPATIBLE_COOKIES: &[&str] = &["g_state"];

/// Build a `Cookie:` header from the JSON text of a cookie export.
///
/// String values have `"` removed and surrounding whitespace trimmed; values
/// containing `{` or `}` are skipped, as are nulls, arrays and objects.
/// Numbers and booleans are stringified. Pairs keep file order and are
/// joined with `"; "`.
pub fn cookie_header_from_json(content: &str) -> Result<SecretString> {
    let data: Value = serde_json::from_str(content)
        .map_err(|e| HarvestError::Session(format!("Failed to parse cookie file: {}", e)))?;

    let entries = data.as_object().ok_or_else(|| {
        HarvestError::Session("Cookie file must contain a JSON object".to_string())
    })?;

    let mut pairs = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        if INCOMPATIBLE_COOKIES.contains(&name.as_str()) {
            tracing::debug!("Skipping incompatible cookie '{}'", name);
            continue;
        }

        let cleaned = match value {
            Value::String(s) => {
                if s.contains('{') || s.contains('}') {
                    tracing::debug!("Skipping cookie '{}' with structured value", name);
                    continue;
                }
                let cleaned = s.replace('"', "").trim().to_string();
                if cleaned.is_empty() {
                    continue;
                }
                cleaned
            }
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };

        pairs.push(format!("{}={}", name, cleaned));
    }

    if pairs.is_empty() {
        return Err(HarvestError::Session(
            "Cookie file contains no usable cookies".to_string(),
        ));
    }

    Ok(SecretString::from(pairs.join("; ")))
}

/// Read a cookie export from disk and build the header
pub fn cookie_header_from_file(path: &Path) -> Result<SecretString> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HarvestError::Session(format!(
            "Failed to read cookie file {}: {}",
            path.display(),
            e
        ))
    })?;
    cookie_header_from_json(&content)
}

/// Look up a single cookie value inside a header string
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Number of `name=value` pairs in a header
pub fn cookie_count(header: &SecretString) -> usize {
    header
        .expose_secret()
        .split(';')
        .filter(|pair| !pair.trim().is_empty())
        .count()
}
