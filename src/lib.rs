//! webhttrack-server: browser control panel for a website mirroring engine
//!
//! The server binds a loopback port, serves localized HTML templates from an
//! installation directory and turns form submissions into commands for a
//! background crawl engine.
//!
//! # Architecture
//!
//! All request-visible data lives in a single string-keyed state store.
//! Templates read it through `${...}` directives, forms write to it, and the
//! command dispatcher consumes the `command` key on every request. The crawl
//! engine runs out of band and reports back through a shared run status.
//!
//! # Modules
//!
//! - `config`: Configuration parsing and management
//! - `control`: HTTP request cycle and command dispatch
//! - `engine`: Crawl engine trait, run status and the process-backed engine
//! - `lang`: Language catalog and string files
//! - `project`: Project layout and profile persistence
//! - `security`: Session ids and path checks
//! - `state`: The shared state store
//! - `template`: The `${...}` template interpreter
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod lang;
pub mod project;
pub mod security;
pub mod state;
pub mod template;

// Re-export commonly used types
pub use error::{Result, ServerError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
