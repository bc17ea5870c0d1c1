//! INI profile reading
//!
//! Profiles are flat `key=value` lines. Values are percent-escaped on disk;
//! a value of exactly `0` stands for an empty option.

use crate::error::Result;
use crate::state::StateStore;
use percent_encoding::percent_decode_str;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parse profile text into key/value pairs, in file order
pub fn parse_profile(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let value = if value == "0" { "" } else { value };
            Some((key.to_string(), unescape_value(value)))
        })
        .collect()
}

/// Decode a stored value: `%%` is a literal `%`, `%xx` is a raw byte
pub fn unescape_value(value: &str) -> String {
    let mut bytes = Vec::with_capacity(value.len());
    for (i, part) in value.split("%%").enumerate() {
        if i > 0 {
            bytes.push(b'%');
        }
        bytes.extend(percent_decode_str(part));
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Load a profile file into the state store
///
/// Returns the number of options loaded. A missing file is not an error and
/// loads nothing.
pub fn load_profile(path: &Path, state: &mut StateStore) -> Result<usize> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No profile at {:?}", path);
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let text = String::from_utf8_lossy(&bytes);
    let pairs = parse_profile(&text);
    let count = pairs.len();
    state.extend(pairs);
    debug!("Loaded {} options from {:?}", count, path);
    Ok(count)
}
