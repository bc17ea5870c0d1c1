//! Catalog file reading
//!
//! `lang.def` and the per-language files are sequences of alternating
//! lines. Lines are trimmed, and a line ending in a backslash continues on
//! the next one. Values carry C-style escapes that are decoded once, at load
//! time.

use std::borrow::Cow;

/// Product name rewritten in every loaded string
const REBRAND_FROM: &str = "WinHTTrack";
/// Replacement, same length as the original so the rewrite is byte-for-byte
const REBRAND_TO: &str = "WebHTTrack";

/// Decode raw file bytes: UTF-8 when valid, Latin-1 otherwise
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Split catalog text into logical lines
pub fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        let mut current = pending.take().unwrap_or_default();
        current.push_str(line);
        if current.ends_with('\\') {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }
    if let Some(rest) = pending {
        lines.push(rest);
    }
    lines
}

/// Pair up logical lines, dropping pairs with an empty member
pub fn line_pairs(text: &str) -> Vec<(String, String)> {
    let lines = logical_lines(text);
    lines
        .chunks(2)
        .filter_map(|pair| match pair {
            [first, second] if !first.is_empty() && !second.is_empty() => {
                Some((first.clone(), second.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Decode escape sequences in a loaded string and apply the product rename
pub fn decode_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0b}'),
            Some('x') => {
                let mut digits = String::new();
                while digits.len() < 2 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u8::from_str_radix(&digits, 16) {
                    Ok(byte) => out.push(byte as char),
                    Err(_) => out.push('x'),
                }
            }
            // \' \" \\ \? and unknown escapes all yield the escaped character
            Some(other) => out.push(other),
            None => {}
        }
    }

    rebrand(out)
}

fn rebrand(value: String) -> String {
    if value.contains(REBRAND_FROM) {
        value.replace(REBRAND_FROM, REBRAND_TO)
    } else {
        value
    }
}
