use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::rate_limit::leading_int;

/// The decoded `response` object of the envelope.
pub type ApiResponse = Map<String, Value>;

/// Deepest container nesting accepted in a response body.
pub const MAX_DEPTH: usize = 32;

/// Response headers in the order they were received.
///
/// Lookups ignore ASCII case; the first matching header wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    /// Parses a raw header block.
    ///
    /// Each `\r\n`-separated line is split on its first `": "`. Lines without
    /// one (the status line, for instance) are skipped.
    pub fn parse(block: &str) -> Self {
        let entries = block
            .split("\r\n")
            .filter_map(|line| line.split_once(": "))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { entries }
    }

    pub fn from_header_map(map: &HeaderMap) -> Self {
        let entries = map
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits a raw HTTP response at the first blank line.
///
/// Without a blank line the whole text is treated as headers.
pub fn split_raw(raw: &str) -> (&str, &str) {
    raw.split_once("\r\n\r\n").unwrap_or((raw, ""))
}

/// Decodes the JSON envelope and pulls out the `response` object, or the
/// error the API reported inside it.
pub(crate) fn decode_envelope(body: &str) -> Result<ApiResponse> {
    let json: Value = serde_json::from_str(body).map_err(|e| Error::malformed(e.to_string()))?;
    if depth(&json) > MAX_DEPTH {
        return Err(Error::malformed(format!(
            "nesting deeper than {} levels",
            MAX_DEPTH
        )));
    }

    let response = match json {
        Value::Object(mut top) => top.remove("response").unwrap_or(Value::Null),
        _ => Value::Null,
    };

    let response = match response {
        Value::Null => return Err(Error::EmptyResponse),
        Value::Object(obj) => obj,
        other => {
            return Err(Error::malformed(format!(
                "`response` is not an object: {}",
                other
            )));
        }
    };

    match response.get("errors") {
        None | Some(Value::Null) => Ok(response),
        Some(errors) => {
            let code = response.get("status").map(status_code).unwrap_or(500);
            Err(Error::api(code, join_errors(errors)))
        }
    }
}

fn status_code(status: &Value) -> i64 {
    match status {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(500),
        Value::String(s) => leading_int(s).unwrap_or(500),
        _ => 500,
    }
}

fn join_errors(errors: &Value) -> String {
    let render = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match errors {
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join("\n"),
        other => render(other),
    }
}

fn depth(v: &Value) -> usize {
    match v {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
