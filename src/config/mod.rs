//! Configuration management
//!
//! Settings come from built-in defaults, an optional TOML file and command
//! line flags, in increasing priority. The resulting [`ServerConfig`] also
//! seeds the state store with the default mirror options.

mod toml_parser;
mod validation;

pub use toml_parser::{TomlConfig, TomlEngineConfig, TomlPathsConfig, TomlServerConfig};

use crate::control::RequestLimits;
use crate::error::Result;
use crate::state::StateStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default mirror options as integers
const INITIAL_INTEGERS: &[(&str, i64)] = &[
    ("filter", 4),
    ("travel", 2),
    ("travel2", 1),
    ("travel3", 1),
    ("connexion", 4),
    ("maxrate", 25000),
    ("build", 1),
    ("checktype", 2),
    ("robots", 3),
];

/// Default mirror options that are switched on
const INITIAL_FLAGS: &[&str] = &[
    "parseall",
    "Cache",
    "ka",
    "cookies",
    "parsejava",
    "testall",
    "updhack",
    "urlhack",
    "index",
];

/// Default mirror options as strings
const INITIAL_STRINGS: &[(&str, &str)] = &[
    ("user", "Mozilla/4.5 (compatible; HTTrack 3.0x; Windows 98)"),
    (
        "footer",
        "<!-- Mirrored from %s%s by HTTrack Website Copier/3.x [XR&CO'2006], %s -->",
    ),
    ("url2", "+*.png +*.gif +*.jpg +*.css +*.js -ad.doubleclick.net/*"),
];

/// Runtime configuration of the control panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: String,
    /// Listening port, 0 to try the well-known candidates
    pub port: u16,
    /// Idle timeout for network reads
    pub io_timeout: Duration,
    /// Largest request body kept
    pub max_body_bytes: usize,
    /// Directory holding `lang.def`, `lang/` and `html/`
    pub install_dir: PathBuf,
    /// Home directory, where the user profile lives
    pub home_dir: PathBuf,
    /// Directory holding the mirror projects
    pub websites_dir: PathBuf,
    /// Mirroring tool launched for each run
    pub engine_binary: PathBuf,
    /// Extra initial state, applied over the built-in options
    pub defaults: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let toml_config = TomlConfig::from_file(path)?;
        Ok(toml_config.into())
    }

    /// Apply command line overrides
    pub fn with_overrides(
        mut self,
        port: Option<u16>,
        install_dir: Option<PathBuf>,
        bind_address: Option<String>,
    ) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(dir) = install_dir {
            self.install_dir = dir;
        }
        if let Some(bind) = bind_address {
            self.bind_address = bind;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_bind_address(&self.bind_address)?;
        validation::validate_timeout(self.io_timeout)?;
        validation::validate_body_limit(self.max_body_bytes)?;
        validation::validate_install_dir(&self.install_dir)?;
        Ok(())
    }

    /// Read limits for the request cycle
    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            timeout: self.io_timeout,
            max_body: self.max_body_bytes,
        }
    }

    /// State store seeded with the default mirror options and a session id
    pub fn initial_state(&self, session_id: &str) -> StateStore {
        let mut state = StateStore::new();
        for (name, value) in INITIAL_INTEGERS {
            state.set(*name, value.to_string());
        }
        for name in INITIAL_FLAGS {
            state.set(*name, "1");
        }
        for (name, value) in INITIAL_STRINGS {
            state.set(*name, *value);
        }
        state.set("path", self.websites_dir.to_string_lossy());
        for (name, value) in &self.defaults {
            state.set(name.as_str(), value.as_str());
        }
        state.set("_sid", session_id);
        state
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

/// Home directory of the current user, `.` when unknown
pub fn default_home_dir() -> PathBuf {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
