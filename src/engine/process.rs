//! Engine backed by an external `httrack` process
//!
//! The argument string is split into words and handed to the configured
//! binary. A supervisor task waits for the child, watches the run's cancel
//! token and reports the exit status back to the run.

use super::{CrawlEngine, RunHandle, StopLevel};
use crate::error::{Result, ServerError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Interval at which the supervisor checks the cancel token
const SUPERVISOR_TICK: Duration = Duration::from_millis(200);

/// Crawl engine running the mirroring tool as a child process
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    binary: PathBuf,
    pid: Arc<Mutex<Option<u32>>>,
}

impl ProcessEngine {
    /// Engine launching `binary`
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            pid: Arc::new(Mutex::new(None)),
        }
    }

    /// Binary launched for each run
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn current_pid(&self) -> Option<u32> {
        self.pid.lock().ok().and_then(|pid| *pid)
    }

    fn signal(&self, name: &str, signal: i32) {
        let Some(pid) = self.current_pid() else {
            debug!("No child process to send {} to", name);
            return;
        };
        if let Err(e) = send_signal(pid, signal) {
            warn!("Failed to send {} to process {}: {}", name, pid, e);
        } else {
            debug!("Sent {} to process {}", name, pid);
        }
    }
}

impl CrawlEngine for ProcessEngine {
    fn start(&self, args: &str, run: RunHandle) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ServerError::Engine(format!("No async runtime available: {}", e)))?;

        let words = split_arguments(args);
        info!("Starting {:?} with {} arguments", self.binary, words.len());

        let child = Command::new(&self.binary)
            .args(&words)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ServerError::Engine(format!("Unable to launch {}: {}", self.binary.display(), e))
            })?;

        if let Ok(mut pid) = self.pid.lock() {
            *pid = child.id();
        }

        runtime.spawn(supervise(child, run, self.pid.clone()));
        Ok(())
    }

    fn stop(&self, force: bool) {
        if force {
            self.signal("SIGKILL", SIGKILL);
        } else {
            self.signal("SIGTERM", SIGTERM);
        }
    }

    fn cancel_file(&self, name: &str) {
        warn!("Cannot cancel '{}': an external process does not accept per-file cancels", name);
    }

    fn cancel_parsing(&self) {
        warn!("Cannot skip parsing: an external process does not accept it");
    }

    fn set_pause(&self, paused: bool) {
        if paused {
            self.signal("SIGSTOP", SIGSTOP);
        } else {
            self.signal("SIGCONT", SIGCONT);
        }
    }

    fn add_urls(&self, urls: &[String]) {
        warn!("Cannot add {} URLs to a running external process", urls.len());
    }
}

async fn supervise(mut child: Child, run: RunHandle, pid: Arc<Mutex<Option<u32>>>) {
    let token = run.cancel_token();
    let mut acted = StopLevel::None;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = tokio::time::sleep(SUPERVISOR_TICK) => {
                let level = token.level();
                if level > acted {
                    acted = level;
                    if level == StopLevel::Forced {
                        if let Err(e) = child.start_kill() {
                            warn!("Failed to kill the engine process: {}", e);
                        }
                    } else if let Some(id) = child.id() {
                        if let Err(e) = send_signal(id, SIGTERM) {
                            warn!("Failed to terminate the engine process: {}", e);
                        }
                    }
                }
            }
        }
    };

    if let Ok(mut pid) = pid.lock() {
        *pid = None;
    }

    match status {
        Ok(status) => match status.code() {
            Some(0) => run.finish(0, ""),
            Some(code) => run.finish(code, format!("Mirror exited with code {}", code)),
            None => run.finish(-1, "Mirror interrupted by a signal"),
        },
        Err(e) => {
            error!("Lost track of the engine process: {}", e);
            run.finish(-1, format!("Unable to wait for the mirror: {}", e));
        }
    }
}

/// Split a command-line string into words; double quotes group words
pub fn split_arguments(args: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in args.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(unix)]
const SIGTERM: i32 = libc::SIGTERM;
#[cfg(unix)]
const SIGKILL: i32 = libc::SIGKILL;
#[cfg(unix)]
const SIGSTOP: i32 = libc::SIGSTOP;
#[cfg(unix)]
const SIGCONT: i32 = libc::SIGCONT;

#[cfg(not(unix))]
const SIGTERM: i32 = 15;
#[cfg(not(unix))]
const SIGKILL: i32 = 9;
#[cfg(not(unix))]
const SIGSTOP: i32 = 19;
#[cfg(not(unix))]
const SIGCONT: i32 = 18;

#[cfg(unix)]
fn send_signal(pid: u32, signal: i32) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) has no memory-safety preconditions
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: i32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunStatus;

    #[test]
    fn test_split_arguments() {
        assert_eq!(
            split_arguments(" -O \"/tmp/my site\"  http://example.com "),
            vec!["-O", "/tmp/my site", "http://example.com"]
        );
        assert_eq!(split_arguments(""), Vec::<String>::new());
        assert_eq!(split_arguments("\"\""), vec![""]);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let engine = ProcessEngine::new("true");
        let status = RunStatus::new();
        let err = engine.start("", RunHandle::new(status)).unwrap_err();
        assert!(matches!(err, ServerError::Engine(_)));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let engine = ProcessEngine::new("/nonexistent/webhttrack-engine");
        let status = RunStatus::new();
        assert!(engine.start("--help", RunHandle::new(status)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_exit_is_reported() {
        let engine = ProcessEngine::new("sh");
        let status = RunStatus::new();
        status.begin("-c \"exit 3\"");
        engine
            .start("-c \"exit 3\"", RunHandle::new(status.clone()))
            .unwrap();

        for _ in 0..100 {
            if status.is_ended() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let outcome = status.take_unpublished_outcome().unwrap();
        assert_eq!(outcome.code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_forced_stop_kills_process() {
        let engine = ProcessEngine::new("sleep");
        let status = RunStatus::new();
        status.begin("30");
        engine.start("30", RunHandle::new(status.clone())).unwrap();

        status.request_stop(StopLevel::Forced);
        for _ in 0..100 {
            if status.is_ended() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(status.is_ended());
        assert_ne!(status.take_unpublished_outcome().unwrap().code, 0);
    }
}
