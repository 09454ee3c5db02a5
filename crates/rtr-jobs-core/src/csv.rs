//! CSV rendering of log events.
//!
//! Columns are the sorted union of event keys. Every cell, header included,
//! is double-quoted with backslash escapes; rows end in CRLF.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::hosts::LogEvent;

/// Render events as CSV. No events renders as an empty string.
pub fn to_csv(events: &[LogEvent]) -> String {
    if events.is_empty() {
        return String::new();
    }

    let headers: Vec<&str> = events
        .iter()
        .flat_map(|e| e.keys().map(String::as_str))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut rows = Vec::with_capacity(events.len() + 1);
    rows.push(
        headers
            .iter()
            .map(|h| quote(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for event in events {
        let row = headers
            .iter()
            .map(|h| quote(&render_cell(event.get(*h))))
            .collect::<Vec<_>>()
            .join(",");
        rows.push(row);
    }
    rows.join("\r\n")
}

/// Text of one cell.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0b}' => out.push_str("\\v"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
