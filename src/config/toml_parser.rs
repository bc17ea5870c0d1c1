//! TOML configuration file parser
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 8080
//! io_timeout_secs = 30
//! max_body_bytes = 32768
//!
//! [paths]
//! install_dir = "/usr/share/httrack"
//! home_dir = "/home/me"
//! websites_dir = "/home/me/websites"
//!
//! [engine]
//! binary = "/usr/bin/httrack"
//!
//! [defaults]
//! robots = "0"
//! ```

use crate::config::{default_home_dir, ServerConfig};
use crate::error::{Result, ServerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Listener settings
    #[serde(default)]
    pub server: TomlServerConfig,

    /// Filesystem locations
    #[serde(default)]
    pub paths: TomlPathsConfig,

    /// Mirroring tool
    #[serde(default)]
    pub engine: TomlEngineConfig,

    /// Initial state store values
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// `[server]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port, 0 to try the well-known candidates
    #[serde(default)]
    pub port: u16,

    /// Idle timeout for network reads, in seconds
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,

    /// Largest request body kept
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

/// `[paths]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlPathsConfig {
    /// Installation directory
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Home directory, defaults to the current user's
    pub home_dir: Option<PathBuf>,

    /// Websites directory, defaults to `<home>/websites`
    pub websites_dir: Option<PathBuf>,
}

/// `[engine]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlEngineConfig {
    /// Binary launched for each mirror
    #[serde(default = "default_engine_binary")]
    pub binary: PathBuf,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| ServerError::Config(format!("Failed to parse TOML config: {}", e)))
    }
}

impl Default for TomlServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: 0,
            io_timeout_secs: default_io_timeout(),
            max_body_bytes: default_max_body(),
        }
    }
}

impl Default for TomlPathsConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            home_dir: None,
            websites_dir: None,
        }
    }
}

impl Default for TomlEngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
        }
    }
}

// Convert TOML config to the runtime config
impl From<TomlConfig> for ServerConfig {
    fn from(toml: TomlConfig) -> Self {
        let home_dir = toml.paths.home_dir.unwrap_or_else(default_home_dir);
        let websites_dir = toml
            .paths
            .websites_dir
            .unwrap_or_else(|| home_dir.join("websites"));

        ServerConfig {
            bind_address: toml.server.bind_address,
            port: toml.server.port,
            io_timeout: Duration::from_secs(toml.server.io_timeout_secs),
            max_body_bytes: toml.server.max_body_bytes,
            install_dir: toml.paths.install_dir,
            home_dir,
            websites_dir,
            engine_binary: toml.engine.binary,
            defaults: toml.defaults,
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_io_timeout() -> u64 {
    30
}

fn default_max_body() -> usize {
    32 * 1024
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("/usr/share/httrack")
}

fn default_engine_binary() -> PathBuf {
    PathBuf::from("httrack")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [server]
            bind_address = "0.0.0.0"
            port = 8081
            io_timeout_secs = 5
            max_body_bytes = 1024

            [paths]
            install_dir = "/opt/httrack"
            home_dir = "/home/me"

            [engine]
            binary = "/usr/local/bin/httrack"

            [defaults]
            robots = "0"
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.io_timeout_secs, 5);
        assert_eq!(config.paths.install_dir, PathBuf::from("/opt/httrack"));
        assert_eq!(config.defaults["robots"], "0");
    }

    #[test]
    fn test_parse_with_defaults() {
        let config = TomlConfig::parse("").expect("Failed to parse TOML");
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.port, 0);
        assert_eq!(config.server.max_body_bytes, 32768);
        assert_eq!(config.engine.binary, PathBuf::from("httrack"));
        assert!(config.defaults.is_empty());
    }

    #[test]
    fn test_convert_to_server_config() {
        let toml = r#"
            [server]
            io_timeout_secs = 10

            [paths]
            install_dir = "/opt/httrack"
            home_dir = "/home/me"
        "#;

        let config: ServerConfig = TomlConfig::parse(toml).unwrap().into();
        assert_eq!(config.io_timeout, Duration::from_secs(10));
        assert_eq!(config.home_dir, PathBuf::from("/home/me"));
        assert_eq!(config.websites_dir, PathBuf::from("/home/me/websites"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            TomlConfig::parse("[server]\nport = \"high\""),
            Err(ServerError::Config(_))
        ));
    }
}
