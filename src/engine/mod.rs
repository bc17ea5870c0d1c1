//! Crawl engine control surface
//!
//! The server never crawls anything itself. It drives an engine through the
//! [`CrawlEngine`] trait and observes the run through a shared [`RunStatus`].
//!
//! Cancellation is cooperative: the server raises the [`StopLevel`] on the
//! run's [`CancelToken`] and returns immediately. The engine polls the token
//! and reports completion through [`RunStatus::finish`] whenever it is done.

mod process;

pub use process::{split_arguments, ProcessEngine};

use crate::error::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Operations the control panel performs on a crawl engine
///
/// Every call returns without waiting for the engine to act on it.
#[cfg_attr(test, mockall::automock)]
pub trait CrawlEngine: Send + Sync {
    /// Start a run with a command-line style argument string
    ///
    /// The engine reports completion through `run`.
    fn start(&self, args: &str, run: RunHandle) -> Result<()>;

    /// Request the running operation to stop, `force` skipping cleanup
    fn stop(&self, force: bool);

    /// Abandon the transfer of one file
    fn cancel_file(&self, name: &str);

    /// Skip the parsing of the current page
    fn cancel_parsing(&self);

    /// Suspend or resume transfers
    fn set_pause(&self, paused: bool);

    /// Queue additional start URLs
    fn add_urls(&self, urls: &[String]);
}

/// How hard a stop has been requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StopLevel {
    /// No stop requested
    None = 0,
    /// Finish pending transfers and exit
    Graceful = 1,
    /// Break the engine's loop right away
    Forced = 2,
}

impl StopLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Graceful,
            _ => Self::Forced,
        }
    }
}

impl fmt::Display for StopLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopLevel::None => write!(f, "none"),
            StopLevel::Graceful => write!(f, "graceful"),
            StopLevel::Forced => write!(f, "forced"),
        }
    }
}

/// Stop request shared between the server and the engine
///
/// The level only ever rises until [`CancelToken::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    level: Arc<AtomicU8>,
}

impl CancelToken {
    /// Create a token with no stop requested
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stop level
    pub fn level(&self) -> StopLevel {
        StopLevel::from_u8(self.level.load(Ordering::SeqCst))
    }

    /// Raise the stop level; lowering is ignored
    pub fn request(&self, level: StopLevel) {
        self.level.fetch_max(level as u8, Ordering::SeqCst);
    }

    /// Whether any stop has been requested
    pub fn is_requested(&self) -> bool {
        self.level() != StopLevel::None
    }

    /// Clear the request for a new run
    pub fn reset(&self) {
        self.level.store(StopLevel::None as u8, Ordering::SeqCst);
    }
}

/// Result of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code, 0 on success
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Command line the run was started with
    pub cmdline: String,
}

/// Lifecycle of the background operation
///
/// `running` and `ended` are never both set. `ended` stays set until the next
/// run begins, while the outcome is published to the state store only once.
#[derive(Debug, Default)]
pub struct RunStatus {
    running: AtomicBool,
    ended: AtomicBool,
    published: AtomicBool,
    cancel: CancelToken,
    outcome: Mutex<RunOutcome>,
}

impl RunStatus {
    /// Create an idle status
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether an operation is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the last operation has completed
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Stop level requested for the current operation
    pub fn stop_level(&self) -> StopLevel {
        self.cancel.level()
    }

    /// Token observed by the engine
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Raise the stop level of the current operation
    pub fn request_stop(&self, level: StopLevel) {
        debug!("Stop requested: {}", level);
        self.cancel.request(level);
    }

    /// Mark a new operation as running
    pub fn begin(&self, cmdline: &str) {
        self.cancel.reset();
        if let Ok(mut outcome) = self.outcome.lock() {
            *outcome = RunOutcome {
                cmdline: cmdline.to_string(),
                ..RunOutcome::default()
            };
        }
        self.published.store(false, Ordering::SeqCst);
        self.ended.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        info!("Background operation started");
    }

    /// Mark the operation as ended without running it
    pub fn mark_ended(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.published.store(false, Ordering::SeqCst);
        self.ended.store(true, Ordering::SeqCst);
    }

    /// Record the outcome of the operation and mark it ended
    pub fn finish(&self, code: i32, message: impl Into<String>) {
        if let Ok(mut outcome) = self.outcome.lock() {
            outcome.code = code;
            outcome.message = message.into();
        }
        info!("Background operation ended with code {}", code);
        self.mark_ended();
    }

    /// Outcome of the ended operation, returned once per run
    pub fn take_unpublished_outcome(&self) -> Option<RunOutcome> {
        if !self.is_ended() || self.published.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.outcome.lock().ok().map(|outcome| outcome.clone())
    }
}

/// Engine side of a run: reports completion and observes cancellation
#[derive(Debug, Clone)]
pub struct RunHandle {
    status: Arc<RunStatus>,
}

impl RunHandle {
    /// Handle onto a shared status
    pub fn new(status: Arc<RunStatus>) -> Self {
        Self { status }
    }

    /// Current stop request
    pub fn stop_level(&self) -> StopLevel {
        self.status.stop_level()
    }

    /// Cancellation token of the run
    pub fn cancel_token(&self) -> CancelToken {
        self.status.cancel_token()
    }

    /// Report the end of the run
    pub fn finish(&self, code: i32, message: impl Into<String>) {
        self.status.finish(code, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_only_escalates() {
        let token = CancelToken::new();
        assert!(!token.is_requested());
        token.request(StopLevel::Forced);
        token.request(StopLevel::Graceful);
        assert_eq!(token.level(), StopLevel::Forced);
        token.reset();
        assert_eq!(token.level(), StopLevel::None);
    }

    #[test]
    fn test_run_lifecycle() {
        let status = RunStatus::new();
        assert!(!status.is_running());
        assert!(status.take_unpublished_outcome().is_none());

        status.begin("--mirror http://example.com");
        assert!(status.is_running());
        assert!(!status.is_ended());

        let handle = RunHandle::new(status.clone());
        status.request_stop(StopLevel::Graceful);
        assert_eq!(handle.stop_level(), StopLevel::Graceful);

        handle.finish(2, "interrupted");
        assert!(!status.is_running());
        assert!(status.is_ended());

        let outcome = status.take_unpublished_outcome().unwrap();
        assert_eq!(outcome.code, 2);
        assert_eq!(outcome.message, "interrupted");
        assert_eq!(outcome.cmdline, "--mirror http://example.com");
        // published once
        assert!(status.take_unpublished_outcome().is_none());
    }

    #[test]
    fn test_begin_clears_previous_run() {
        let status = RunStatus::new();
        status.begin("a");
        status.request_stop(StopLevel::Forced);
        status.finish(1, "failed");

        status.begin("b");
        assert_eq!(status.stop_level(), StopLevel::None);
        assert!(!status.is_ended());
        status.mark_ended();
        assert_eq!(status.take_unpublished_outcome().unwrap().code, 0);
    }

    #[test]
    fn test_stop_level_display() {
        assert_eq!(StopLevel::Graceful.to_string(), "graceful");
        assert_eq!(StopLevel::Forced.to_string(), "forced");
    }
}
