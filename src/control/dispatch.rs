//! Command dispatcher
//!
//! Forms carry at most one `command` field. It is consumed on every request,
//! whether or not it could be honoured, so a reload never replays it.

use crate::engine::{CrawlEngine, RunHandle, RunStatus, StopLevel};
use crate::error::ServerError;
use crate::project::{write_user_profile, ProjectLayout};
use crate::state::StateStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Page shown after a failed command
pub const ERROR_PAGE: &str = "/server/error.html";

const MISSING_PROJECT: &str = "Internal server error: unable to fetch project name or path";

/// A parsed `command` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `cancel`: graceful stop, escalated to forced when repeated
    Cancel,
    /// `cancel-file=<name>`
    CancelFile(&'a str),
    /// `cancel-parsing`
    CancelParsing,
    /// `pause=...`
    Pause,
    /// `unpause`
    Unpause,
    /// `abort`: forced stop
    Abort,
    /// `add-url=<url>`
    AddUrl(&'a str),
    /// `httrack<args>`: save the profiles and start a mirror
    Httrack(&'a str),
    /// `quit`: leave the accept loop after this response
    Quit,
    /// Anything else
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// Parse a command; keyword commands match exactly, prefixed ones
    /// case-insensitively
    pub fn parse(text: &'a str) -> Self {
        match text {
            "cancel" => return Command::Cancel,
            "cancel-parsing" => return Command::CancelParsing,
            "abort" => return Command::Abort,
            "quit" => return Command::Quit,
            _ => {}
        }
        if let Some(name) = strip_prefix_ci(text, "cancel-file=") {
            Command::CancelFile(name)
        } else if strip_prefix_ci(text, "pause=").is_some() {
            Command::Pause
        } else if strip_prefix_ci(text, "unpause").is_some() {
            Command::Unpause
        } else if let Some(url) = strip_prefix_ci(text, "add-url=") {
            Command::AddUrl(url)
        } else if let Some(args) = strip_prefix_ci(text, "httrack") {
            Command::Httrack(args)
        } else {
            Command::Unknown(text)
        }
    }
}

/// What the request cycle must do after dispatching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Leave the accept loop once the response is sent
    pub quit: bool,
    /// Answer with the error page; the message is in the `error` key
    pub error_redirect: bool,
}

/// Executes form commands against the crawl engine
pub struct CommandDispatcher {
    engine: Arc<dyn CrawlEngine>,
    run: Arc<RunStatus>,
    home_dir: PathBuf,
}

impl CommandDispatcher {
    /// Create a dispatcher
    pub fn new(engine: Arc<dyn CrawlEngine>, run: Arc<RunStatus>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            run,
            home_dir: home_dir.into(),
        }
    }

    /// Shared run status
    pub fn run(&self) -> &Arc<RunStatus> {
        &self.run
    }

    /// Consume and execute the `command` key
    ///
    /// `project_dir` is the directory profiles are written to when a mirror
    /// starts.
    pub fn dispatch(&self, state: &mut StateStore, project_dir: Option<&Path>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(text) = state.take("command") else {
            return outcome;
        };

        let command = Command::parse(&text);
        info!("Dispatching command {:?}", command);
        let running = self.run.is_running();

        match command {
            Command::Cancel if running => {
                if self.run.stop_level() == StopLevel::None {
                    self.run.request_stop(StopLevel::Graceful);
                    self.engine.stop(false);
                } else {
                    warn!("Stop already requested, forcing");
                    self.engine.stop(true);
                    self.run.request_stop(StopLevel::Forced);
                }
            }
            Command::CancelFile(name) if running => self.engine.cancel_file(name),
            Command::CancelParsing if running => self.engine.cancel_parsing(),
            Command::Pause if running => self.engine.set_pause(true),
            Command::Unpause if running => self.engine.set_pause(false),
            Command::Abort if running => {
                self.engine.stop(true);
                self.run.request_stop(StopLevel::Forced);
            }
            Command::AddUrl(url) if running => self.engine.add_urls(&[url.to_string()]),
            Command::Httrack(args) if !running => {
                if let Err(message) = self.start_mirror(state, project_dir, args) {
                    error!("Command failed: {}", message);
                    state.set("error", message);
                    outcome.error_redirect = true;
                }
            }
            Command::Quit => outcome.quit = true,
            Command::Unknown(other) => warn!("Unknown command '{}'", other),
            other => debug!(
                "Ignoring {:?}: operation is {}",
                other,
                if running { "running" } else { "not running" }
            ),
        }

        outcome
    }

    /// Save both profiles, then start the mirror or just mark it ended
    fn start_mirror(
        &self,
        state: &StateStore,
        project_dir: Option<&Path>,
        args: &str,
    ) -> Result<(), String> {
        let Some(action) = state.read("command_do") else {
            debug!("No command_do, nothing to start");
            return Ok(());
        };
        let (Some(profile), Some(project_dir)) = (state.read("winprofile"), project_dir) else {
            return Err(MISSING_PROJECT.to_string());
        };

        if let Some(user_profile) = state.read("userprofile") {
            if let Err(e) = write_user_profile(&self.home_dir, user_profile) {
                warn!("{}", e);
            }
        }

        ProjectLayout::from_dir(project_dir)
            .write_profile(profile)
            .map_err(|e| error_message(&e))?;

        if action == "start" {
            self.run.begin(args);
            let handle = RunHandle::new(self.run.clone());
            if let Err(e) = self.engine.start(args, handle) {
                let message = error_message(&e);
                self.run.finish(-1, message.clone());
                return Err(message);
            }
        } else {
            self.run.mark_ended();
        }
        Ok(())
    }
}

/// Message stored in the `error` key, without the error-kind prefix
fn error_message(err: &ServerError) -> String {
    match err {
        ServerError::Persistence(msg) | ServerError::Engine(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}
