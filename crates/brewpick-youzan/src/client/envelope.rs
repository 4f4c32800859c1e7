//! Response-shape handling for the product-listing endpoint.
//!
//! Listing responses may wrap the payload in a `data` envelope and put the
//! item array under any of several keys, or return a bare array.

use serde_json::Value;

use crate::normalize::pick;

const LIST_KEYS: &[&str] = &["products", "items", "list", "records"];
const TOTAL_KEYS: &[&str] = &["count", "total", "total_count"];

/// One page of raw, not-yet-normalized list items.
#[derive(Debug, Default)]
pub(crate) struct Page {
    pub items: Vec<Value>,
    /// Upstream-declared total across all pages, when present and non-zero.
    pub total: Option<usize>,
}

/// Unwraps an optional `data` envelope.
fn unwrap_envelope(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if !data.is_null() && *data != Value::Bool(false) => data,
        _ => body,
    }
}

/// Extracts the page of items and declared total from a parsed body.
///
/// Unrecognized shapes yield an empty page rather than an error.
pub(crate) fn extract_page(body: &Value) -> Page {
    let root = unwrap_envelope(body);

    let items = match root {
        Value::Array(items) => items.clone(),
        _ => LIST_KEYS
            .iter()
            .find_map(|key| root.get(*key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
    };

    let total = pick(root, TOTAL_KEYS)
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0);

    Page { items, total }
}

/// Returns `true` if any `err_code` anywhere in `body` equals `code`.
///
/// Youzan reports gateway errors inside HTTP 200 responses, nested at
/// varying depths (`gw_err_resp.err_code`, `error_response.err_code`, ...).
pub(crate) fn has_err_code(body: &Value, code: i64) -> bool {
    match body {
        Value::Object(map) => map.iter().any(|(key, value)| {
            let matches = key == "err_code"
                && match value {
                    Value::Number(n) => n.as_i64() == Some(code),
                    Value::String(s) => s.trim().parse::<i64>().ok() == Some(code),
                    _ => false,
                };
            matches || has_err_code(value, code)
        }),
        Value::Array(items) => items.iter().any(|v| has_err_code(v, code)),
        _ => false,
    }
}
