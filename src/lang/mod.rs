//! Localized string resources
//!
//! The catalog has two tiers:
//!
//! - a *key table* built once from `lang.def`, mapping external keys (the
//!   English source text) to internal symbolic keys such as `LANG_START`;
//! - a *string table* mapping internal keys to the text of the active
//!   language, rebuilt on every language switch from `lang/<file>.txt` and
//!   backfilled from the default language (index 0) for missing entries.
//!
//! Language `n` (zero-based) is described by the key-table entry
//! `LANGUAGE_<n+1>`, whose internal key is the base name of its string file.

mod reader;

pub use reader::{decode_text, decode_value, line_pairs, logical_lines};

use crate::error::{Result, ServerError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Master catalog file name, relative to the installation directory
pub const MASTER_CATALOG: &str = "lang.def";

/// Directory holding per-language string files
pub const LANGUAGE_DIR: &str = "lang";

/// Catalog key holding a language's display name
pub const LANGUAGE_NAME_KEY: &str = "LANGUAGE_NAME";

/// Catalog key holding a language's ISO code
pub const LANGUAGE_ISO_KEY: &str = "LANGUAGE_ISO";

/// Description of one installed language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageInfo {
    /// Zero-based language index
    pub index: usize,
    /// Base name of the string file under `lang/`
    pub file: String,
    /// Display name (`LANGUAGE_NAME`), or the file name when missing
    pub name: String,
    /// ISO code (`LANGUAGE_ISO`), possibly empty
    pub iso: String,
}

/// Two-tier localized string lookup with default-language fallback
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    /// Installation directory containing `lang.def` and `lang/`
    root: PathBuf,
    /// External key -> internal key
    keys: HashMap<String, String>,
    /// Internal key -> localized string for the active language
    strings: HashMap<String, String>,
    /// Active language index
    active: usize,
}

impl LanguageCatalog {
    /// Load the key table from `<root>/lang.def` and activate the default
    /// language
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let master = root.join(MASTER_CATALOG);
        let bytes = fs::read(&master).map_err(|e| {
            ServerError::Language(format!(
                "unable to find {} in {:?}: {}",
                MASTER_CATALOG, root, e
            ))
        })?;

        let keys = build_key_table(&decode_text(&bytes));
        debug!("Loaded {} catalog keys from {:?}", keys.len(), master);

        let mut catalog = Self {
            root,
            keys,
            strings: HashMap::new(),
            active: 0,
        };
        catalog.strings = catalog.load_strings(0)?;
        info!("Language catalog ready ({} strings)", catalog.strings.len());
        Ok(catalog)
    }

    /// Activate a language and rebuild the string table
    ///
    /// Returns the previously active index. On failure the active language
    /// and its strings are left untouched.
    pub fn select_language(&mut self, index: usize) -> Result<usize> {
        let strings = self.load_strings(index)?;
        let previous = self.active;
        self.active = index;
        self.strings = strings;
        info!("Switched language {} -> {}", previous, index);
        Ok(previous)
    }

    /// Currently active language index
    pub fn active_language(&self) -> usize {
        self.active
    }

    /// Map an external key to its internal key
    pub fn resolve(&self, external: &str) -> Option<&str> {
        self.keys
            .get(external)
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }

    /// Localized string for `name`, or an empty string when unknown
    ///
    /// `name` may be an internal key or an external key.
    pub fn lookup(&self, name: &str) -> &str {
        if let Some(value) = self.strings.get(name) {
            return value;
        }
        self.resolve(name)
            .and_then(|internal| self.strings.get(internal))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Display names of every installed language, in index order
    ///
    /// Probing reads the language files directly; the active language and
    /// its string table are never touched.
    pub fn enumerate_language_names(&self) -> Vec<String> {
        self.languages().into_iter().map(|l| l.name).collect()
    }

    /// ISO identifiers of every installed language, in index order
    ///
    /// Languages without an ISO entry are listed by display name.
    pub fn enumerate_language_isos(&self) -> Vec<String> {
        self.languages()
            .into_iter()
            .map(|l| if l.iso.is_empty() { l.name } else { l.iso })
            .collect()
    }

    /// Index of the language whose ISO code prefixes `iso`
    /// (case-insensitive), e.g. `fr` for an `Accept-Language` of `fr-FR`
    pub fn find_language_by_iso(&self, iso: &str) -> Option<usize> {
        let iso = iso.trim().to_ascii_lowercase();
        if iso.is_empty() {
            return None;
        }
        self.languages()
            .into_iter()
            .find(|l| !l.iso.is_empty() && iso.starts_with(&l.iso.to_ascii_lowercase()))
            .map(|l| l.index)
    }

    /// Every installed language, probing indices until one is undefined
    pub fn languages(&self) -> Vec<LanguageInfo> {
        let mut out = Vec::new();
        let mut index = 0;
        while let Some(file) = self.language_file(index) {
            let table = self.read_language_file(file).unwrap_or_default();
            let name = self
                .probe(&table, LANGUAGE_NAME_KEY)
                .unwrap_or_else(|| file.to_string());
            let iso = self.probe(&table, LANGUAGE_ISO_KEY).unwrap_or_default();
            out.push(LanguageInfo {
                index,
                file: file.to_string(),
                name,
                iso,
            });
            index += 1;
        }
        out
    }

    /// Installation directory this catalog was loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// String file base name for a language index
    fn language_file(&self, index: usize) -> Option<&str> {
        self.resolve(&format!("LANGUAGE_{}", index + 1))
    }

    fn probe(&self, table: &HashMap<String, String>, name: &str) -> Option<String> {
        table
            .get(name)
            .or_else(|| self.resolve(name).and_then(|k| table.get(k)))
            .filter(|v| !v.is_empty())
            .cloned()
    }

    /// Build the string table for a language: its own file first, then the
    /// default language filling gaps only
    fn load_strings(&self, index: usize) -> Result<HashMap<String, String>> {
        let file = self.language_file(index).ok_or_else(|| {
            ServerError::Language(format!("language {} is not defined in {}", index, MASTER_CATALOG))
        })?;
        let mut strings = self.read_language_file(file)?;

        if index != 0 {
            let default_file = self.language_file(0).ok_or_else(|| {
                ServerError::Language(format!("default language is not defined in {}", MASTER_CATALOG))
            })?;
            let defaults = self.read_language_file(default_file)?;
            let mut filled = 0;
            for (key, value) in defaults {
                strings.entry(key).or_insert_with(|| {
                    filled += 1;
                    value
                });
            }
            if filled > 0 {
                debug!("Filled {} missing strings from the default language", filled);
            }
        }

        Ok(strings)
    }

    /// Read one language file into an internal-key table
    ///
    /// The k-th repetition of an external key maps to the k-th suffixed
    /// variant of that key in the key table.
    fn read_language_file(&self, file: &str) -> Result<HashMap<String, String>> {
        let path = self.root.join(LANGUAGE_DIR).join(format!("{}.txt", file));
        let bytes = fs::read(&path).map_err(|e| {
            warn!("Unable to read language file {:?}: {}", path, e);
            ServerError::Language(format!("unable to read {:?}: {}", path, e))
        })?;

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut table = HashMap::new();
        for (external, value) in line_pairs(&decode_text(&bytes)) {
            let occurrence = seen.entry(external.clone()).or_insert(0);
            let key = if *occurrence == 0 {
                external.clone()
            } else {
                format!("{}{}", external, occurrence)
            };
            *occurrence += 1;

            if let Some(internal) = self.resolve(&key) {
                table
                    .entry(internal.to_string())
                    .or_insert_with(|| decode_value(&value));
            }
        }
        Ok(table)
    }
}

/// Build the external -> internal key table from `lang.def` text
///
/// Each entry is an internal-key line followed by an external-key line.
/// Repeated external keys get an increasing numeric suffix (`Ok`, `Ok1`,
/// `Ok2`, ...) so every entry stays addressable; file order decides which
/// entry receives which suffix.
pub fn build_key_table(text: &str) -> HashMap<String, String> {
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut counters: HashMap<String, usize> = HashMap::new();

    for (internal, external) in line_pairs(text) {
        let mut key = external.clone();
        if keys.contains_key(&key) {
            let counter = counters.entry(external.clone()).or_insert(0);
            loop {
                *counter += 1;
                key = format!("{}{}", external, counter);
                if !keys.contains_key(&key) {
                    break;
                }
            }
        }
        keys.insert(key, internal);
    }
    keys
}
