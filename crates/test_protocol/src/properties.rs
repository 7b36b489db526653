//! Flat `key=value` properties files.
//!
//! The escaping follows the classic properties format so that keys and values
//! may contain separators, comment characters, leading blanks and newlines.
//! Files are written and read as UTF-8.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ProtocolError, ProtocolResult};

/// Render properties as text, sorted by key, with an optional `#` comment header.
#[must_use]
pub fn format_properties(properties: &BTreeMap<String, String>, comment: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push('#');
            out.push_str(line);
            out.push('\n');
        }
    }
    for (key, value) in properties {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

/// Parse properties text. Later duplicates win.
#[must_use]
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let trimmed = trim_blank(line);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(trim_blank(next)),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        properties.insert(unescape(key), unescape(value));
    }

    properties
}

pub fn write_properties(
    path: &Path,
    properties: &BTreeMap<String, String>,
    comment: Option<&str>,
) -> ProtocolResult<()> {
    fs::write(path, format_properties(properties, comment)).map_err(|e| ProtocolError::io(path, e))
}

pub fn read_properties(path: &Path) -> ProtocolResult<BTreeMap<String, String>> {
    let content = fs::read_to_string(path).map_err(|e| ProtocolError::io(path, e))?;
    Ok(parse_properties(&content))
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, ch) in text.chars().enumerate() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            _ => out.push(ch),
        }
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    let backslashes = line.chars().rev().take_while(|c| *c == '\\').count();
    backslashes % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..index], trim_blank(&line[index + 1..])),
            c if is_blank(c) => {
                let rest = trim_blank(&line[index..]);
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..index], trim_blank(rest));
            }
            _ => {}
        }
    }
    (line, "")
}

// Only space, tab and form feed pad or separate entries.
fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

fn trim_blank(text: &str) -> &str {
    text.trim_start_matches(is_blank)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
