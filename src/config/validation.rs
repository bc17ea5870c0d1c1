//! Configuration validation functions

use crate::error::{Result, ServerError};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Validate the listener address
pub fn validate_bind_address(address: &str) -> Result<()> {
    let ip: IpAddr = address
        .parse()
        .map_err(|_| ServerError::Config(format!("Invalid bind address: {}", address)))?;

    if !ip.is_loopback() {
        warn!(
            "Binding to {}: the control panel will be reachable from other hosts",
            address
        );
    }
    Ok(())
}

/// Validate the network idle timeout
pub fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(ServerError::Config(
            "I/O timeout cannot be 0".to_string(),
        ));
    }
    Ok(())
}

/// Validate the request body limit
pub fn validate_body_limit(max_body: usize) -> Result<()> {
    if max_body == 0 {
        return Err(ServerError::Config(
            "Maximum body size cannot be 0".to_string(),
        ));
    }
    Ok(())
}

/// Validate the installation directory setting
///
/// Existence is checked when the language catalog loads.
pub fn validate_install_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(ServerError::Config(
            "Installation directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}
