//! Request hardening
//!
//! The control panel listens on loopback and trusts its user, so protection
//! is limited to a few checks:
//! - a per-process session id that every form post must echo back
//! - rejection of request and template paths containing `..`
//! - rejection of redirect targets containing line breaks

use tracing::{info, warn};

mod session;
mod validation;

pub use session::{generate_session_id, session_matches, SESSION_ID_LEN};
pub use validation::{is_traversal, sanitize_request_path, validate_project_name, validate_redirect};

/// Security-relevant events worth an audit line
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    /// A form carried a session id that is not ours
    SessionMismatch {
        /// The id the client sent
        received: String,
    },
    /// A request or template path tried to leave its root
    PathTraversal {
        /// The offending path
        path: String,
    },
    /// A form-supplied redirect target carried a line break
    HeaderInjection {
        /// The rejected target
        location: String,
    },
    /// A new session id was issued at startup
    SessionIssued,
}

impl SecurityEvent {
    /// Log a security event
    pub fn log(&self) {
        match self {
            Self::SessionMismatch { received } => {
                warn!("Security: session id mismatch (received '{}')", received);
            }
            Self::PathTraversal { path } => {
                warn!("Security: rejected path '{}'", path);
            }
            Self::HeaderInjection { location } => {
                warn!("Security: rejected redirect target {:?}", location);
            }
            Self::SessionIssued => {
                info!("Security: session id issued");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_logging_does_not_panic() {
        SecurityEvent::SessionMismatch {
            received: "bad".to_string(),
        }
        .log();
        SecurityEvent::PathTraversal {
            path: "/website/../x".to_string(),
        }
        .log();
        SecurityEvent::HeaderInjection {
            location: "/x\r\ny".to_string(),
        }
        .log();
        SecurityEvent::SessionIssued.log();
    }
}
