//! Output modes and value escaping
//!
//! A single output mode governs both escaping of substituted values and
//! suppression of output inside a failed conditional. Modes do not nest.

use std::fmt;

/// Template output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// A conditional failed; everything is discarded until `end-if`
    Suppressed,
    /// Values are emitted as-is
    #[default]
    Raw,
    /// `<`, `>` and `&` become entities
    Html,
    /// HTML escaping plus `%xx` for control bytes and `%%` for `%`
    IniFile,
    /// HTML escaping plus `%xx` for control bytes, `%20` and `%25`
    HtmlUrlEscaped,
}

impl OutputMode {
    /// Numeric level: -1 suppressed, 0 raw, 1 html, 2 inifile, 3 url-escaped
    pub fn level(self) -> i32 {
        match self {
            Self::Suppressed => -1,
            Self::Raw => 0,
            Self::Html => 1,
            Self::IniFile => 2,
            Self::HtmlUrlEscaped => 3,
        }
    }

    /// Mode selected by `do:output-mode:<name>`; unknown names reset to raw
    pub fn from_name(name: &str) -> Self {
        match name {
            "html" => Self::Html,
            "inifile" => Self::IniFile,
            "html-urlescaped" => Self::HtmlUrlEscaped,
            _ => Self::Raw,
        }
    }

    /// Whether output is currently discarded
    pub fn is_suppressed(self) -> bool {
        self == Self::Suppressed
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suppressed => write!(f, "suppressed"),
            Self::Raw => write!(f, "raw"),
            Self::Html => write!(f, "html"),
            Self::IniFile => write!(f, "inifile"),
            Self::HtmlUrlEscaped => write!(f, "html-urlescaped"),
        }
    }
}

/// Append `value` to `out` escaped for `mode`
///
/// A backslash followed by two hex digits is decoded to the raw byte first,
/// whatever the mode.
pub fn escape_value(value: &str, mode: OutputMode, out: &mut Vec<u8>) {
    let level = mode.level();
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && is_hex_pair(bytes, i + 1) {
            out.push(hex_pair(bytes, i + 1));
            i += 3;
            continue;
        }
        match b {
            b'<' if level > 0 => out.extend_from_slice(b"&lt;"),
            b'>' if level > 0 => out.extend_from_slice(b"&gt;"),
            b'&' if level > 0 => out.extend_from_slice(b"&amp;"),
            b' ' if level == 3 => out.extend_from_slice(b"%20"),
            c if level >= 2 && c < 32 => out.extend_from_slice(format!("%{:02x}", c).as_bytes()),
            b'%' if level == 2 => out.extend_from_slice(b"%%"),
            b'%' if level == 3 => out.extend_from_slice(b"%25"),
            c => out.push(c),
        }
        i += 1;
    }
}

/// Append `value` with `<`, `>` and `&` replaced by entities
pub fn escape_html(value: &str, out: &mut Vec<u8>) {
    for &b in value.as_bytes() {
        match b {
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'&' => out.extend_from_slice(b"&amp;"),
            c => out.push(c),
        }
    }
}

fn is_hex_pair(bytes: &[u8], at: usize) -> bool {
    at + 1 < bytes.len() && bytes[at].is_ascii_hexdigit() && bytes[at + 1].is_ascii_hexdigit()
}

fn hex_pair(bytes: &[u8], at: usize) -> u8 {
    (hex_digit(bytes[at]) << 4) | hex_digit(bytes[at + 1])
}

fn hex_digit(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}
