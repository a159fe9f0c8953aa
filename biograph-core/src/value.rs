//! Dynamic property values
//!
//! Records carry typed core fields plus arbitrary extra properties. The
//! extra properties use [`PropertyValue`], a closed sum over the value
//! shapes every supported serialization can express.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Delimiter joining multivalued fields in tabular serializations.
pub const LIST_DELIMITER: char = '|';

/// A dynamically-typed record property.
///
/// The untagged serde representation round-trips through JSON as the
/// natural scalar/array forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag (e.g. `negated`)
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Free-text scalar
    String(String),
    /// List of strings; set-or-list discipline is decided by the field
    List(Vec<String>),
    /// List of numbers
    NumberList(Vec<f64>),
}

impl PropertyValue {
    /// Borrow as a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a string list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// View any value as a list of strings, coercing scalars to a
    /// single-element list. Used by merge and by tabular export.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            PropertyValue::Bool(b) => vec![b.to_string()],
            PropertyValue::Number(n) => vec![format_number(*n)],
            PropertyValue::String(s) => vec![s.clone()],
            PropertyValue::List(items) => items.clone(),
            PropertyValue::NumberList(items) => items.iter().map(|n| format_number(*n)).collect(),
        }
    }

    /// Render for a tabular cell: lists joined with `|`.
    pub fn to_cell(&self) -> String {
        match self {
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Number(n) => format_number(*n),
            PropertyValue::String(s) => sanitize_cell(s),
            PropertyValue::List(items) => items
                .iter()
                .map(|s| sanitize_cell(s))
                .collect::<Vec<_>>()
                .join("|"),
            PropertyValue::NumberList(items) => items
                .iter()
                .map(|n| format_number(*n))
                .collect::<Vec<_>>()
                .join("|"),
        }
    }

    /// Convert an arbitrary JSON value. Nulls yield `None`; nested objects
    /// are stringified (no supported format nests objects in properties).
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(PropertyValue::Bool(*b)),
            JsonValue::Number(n) => n.as_f64().map(PropertyValue::Number),
            JsonValue::String(s) => Some(PropertyValue::String(sanitize_import(s))),
            JsonValue::Array(items) => {
                if !items.is_empty() && items.iter().all(|v| v.is_number()) {
                    Some(PropertyValue::NumberList(
                        items.iter().filter_map(|v| v.as_f64()).collect(),
                    ))
                } else {
                    Some(PropertyValue::List(
                        items
                            .iter()
                            .map(|v| match v {
                                JsonValue::String(s) => sanitize_import(s),
                                other => other.to_string(),
                            })
                            .collect(),
                    ))
                }
            }
            JsonValue::Object(_) => Some(PropertyValue::String(value.to_string())),
        }
    }

    /// Convert back into a JSON value.
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// Parse a raw tabular cell, splitting on `|` when present.
    pub fn from_cell(raw: &str) -> Option<Self> {
        let cleaned = sanitize_import(raw);
        if cleaned.is_empty() {
            return None;
        }
        if cleaned.contains(LIST_DELIMITER) {
            Some(PropertyValue::List(split_list(&cleaned)))
        } else {
            Some(PropertyValue::String(cleaned))
        }
    }
}

/// Split a `|`-joined cell into its parts, honoring backquote escapes
/// (`` `a|b` `` keeps the pipe) and dropping empty segments.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    for c in raw.chars() {
        match c {
            '`' => quoted = !quoted,
            LIST_DELIMITER if !quoted => {
                if !cur.is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Join list elements for a tabular cell, backquote-escaping any element
/// that itself contains the delimiter.
pub fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| {
            let cleaned = sanitize_cell(s);
            if cleaned.contains(LIST_DELIMITER) {
                format!("`{}`", cleaned)
            } else {
                cleaned
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Replace embedded tabs and newlines with spaces on import.
pub fn sanitize_import(s: &str) -> String {
    if s.contains(['\n', '\t', '\r']) {
        s.replace(['\n', '\t', '\r'], " ")
    } else {
        s.to_string()
    }
}

fn sanitize_cell(s: &str) -> String {
    sanitize_import(s)
}

/// Render a float without a trailing `.0` when it is integral.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
