//! Shared key-value state store
//!
//! The state store holds every variable the control panel knows about: form
//! fields posted by the browser, options loaded from profiles, and values
//! computed by the server itself. It lives for the whole process and is never
//! cleared between requests, so project and session context survive page
//! reloads.
//!
//! Keys are either present with a value or absent. Writing `None` removes the
//! key.

use std::collections::HashMap;
use tracing::trace;

/// Process-lifetime mapping from variable names to string values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStore {
    entries: HashMap<String, String>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Replace or delete an entry
    pub fn write<K, V>(&mut self, key: K, value: Option<V>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        match value {
            Some(value) => {
                let value = value.into();
                trace!("state: {} = {:?}", key, value);
                self.entries.insert(key, value);
            }
            None => {
                trace!("state: {} removed", key);
                self.entries.remove(&key);
            }
        }
    }

    /// Set a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.write(key, Some(value));
    }

    /// Remove a key
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Read a value
    pub fn read(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Read a value and remove it in the same step
    ///
    /// Used for control fields such as `command`, which must not be replayed
    /// by a later request.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Whether the key is absent or holds an empty string
    pub fn is_empty_value(&self, key: &str) -> bool {
        self.read(key).map_or(true, str::is_empty)
    }

    /// Read a value as a leading integer, the way form fields are interpreted
    pub fn read_int(&self, key: &str) -> Option<i64> {
        self.read(key).and_then(parse_leading_int)
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Merge a sequence of key/value pairs
    pub fn extend<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }
}

/// Parse the integer at the start of `s`, ignoring leading whitespace and any
/// trailing garbage (`"12abc"` is 12, `"abc"` is nothing).
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}
