//! Project layout and profile persistence
//!
//! Each mirror project lives in `<websites>/<projname>`. Its options are kept
//! in `hts-cache/winprofile.ini`; a global user profile lives in the home
//! directory. Before a mirror starts, both profiles are written and the stale
//! operation log is removed.

mod categories;
mod profile;

pub use categories::{scan_categories, ProjectCategories};
pub use profile::{load_profile, parse_profile, unescape_value};

use crate::error::{Result, ServerError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-project cache directory
pub const CACHE_DIR: &str = "hts-cache";

/// Project profile file, inside the cache directory
pub const PROFILE_FILE: &str = "winprofile.ini";

/// Operation log removed on every fresh start
pub const OPERATION_LOG: &str = "doit.log";

/// User profile file name, inside the home directory
#[cfg(windows)]
pub const USER_PROFILE_FILE: &str = "httrack.ini";
/// User profile file name, inside the home directory
#[cfg(not(windows))]
pub const USER_PROFILE_FILE: &str = ".httrack.ini";

/// Path of the global user profile
pub fn user_profile_path(home: &Path) -> PathBuf {
    home.join(USER_PROFILE_FILE)
}

/// Paths of a single project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    dir: PathBuf,
}

impl ProjectLayout {
    /// Layout rooted at `<websites>/<projname>`
    pub fn new(websites: &Path, projname: &str) -> Self {
        Self {
            dir: websites.join(projname),
        }
    }

    /// Layout for an existing project directory
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Project directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `hts-cache` directory
    pub fn cache_dir(&self) -> PathBuf {
        self.dir.join(CACHE_DIR)
    }

    /// Project profile path
    pub fn profile_path(&self) -> PathBuf {
        self.cache_dir().join(PROFILE_FILE)
    }

    /// Operation log path
    pub fn operation_log(&self) -> PathBuf {
        self.cache_dir().join(OPERATION_LOG)
    }

    /// Write the project profile, recreating the cache directory if needed,
    /// then remove the stale operation log
    pub fn write_profile(&self, contents: &str) -> Result<()> {
        let cache = self.cache_dir();
        fs::create_dir_all(&cache).map_err(|e| {
            error_persist(format!(
                "Unable to create the directory structure in {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.profile_path();
        fs::write(&path, contents.as_bytes()).map_err(|e| {
            error_persist(format!(
                "Unable to write {} bytes in the init file {}: {}",
                contents.len(),
                path.display(),
                e
            ))
        })?;
        debug!("Wrote project profile {:?}", path);

        // every option is replicated in the profile, the old log only adds ghosts
        let log = self.operation_log();
        match fs::remove_file(&log) {
            Ok(()) => debug!("Removed stale operation log {:?}", log),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Unable to remove {:?}: {}", log, e),
        }

        info!("Project profile saved in {:?}", self.dir);
        Ok(())
    }
}

/// Write the global user profile; an empty profile is not written
pub fn write_user_profile(home: &Path, contents: &str) -> Result<()> {
    if contents.is_empty() {
        return Ok(());
    }
    let path = user_profile_path(home);
    fs::write(&path, contents.as_bytes()).map_err(|e| {
        error_persist(format!("Unable to write the user profile {}: {}", path.display(), e))
    })?;
    debug!("Wrote user profile {:?}", path);
    Ok(())
}

fn error_persist(message: String) -> ServerError {
    ServerError::Persistence(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new(Path::new("/home/me/websites"), "site");
        assert_eq!(layout.dir(), Path::new("/home/me/websites/site"));
        assert_eq!(
            layout.profile_path(),
            Path::new("/home/me/websites/site/hts-cache/winprofile.ini")
        );
        assert_eq!(
            layout.operation_log(),
            Path::new("/home/me/websites/site/hts-cache/doit.log")
        );
    }

    #[test]
    fn test_write_profile_creates_cache_and_clears_log() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path(), "site");

        std::fs::create_dir_all(layout.cache_dir()).unwrap();
        std::fs::write(layout.operation_log(), "old").unwrap();

        layout.write_profile("Depth=3\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(layout.profile_path()).unwrap(),
            "Depth=3\n"
        );
        assert!(!layout.operation_log().exists());
    }

    #[test]
    fn test_write_profile_reports_directory_failure() {
        let dir = TempDir::new().unwrap();
        // a file where the project directory should be
        std::fs::write(dir.path().join("site"), "blocker").unwrap();
        let layout = ProjectLayout::new(dir.path(), "site");

        let err = layout.write_profile("Depth=3\n").unwrap_err();
        match err {
            ServerError::Persistence(msg) => {
                assert!(msg.starts_with("Unable to create the directory structure"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_user_profile() {
        let dir = TempDir::new().unwrap();
        write_user_profile(dir.path(), "").unwrap();
        assert!(!user_profile_path(dir.path()).exists());

        write_user_profile(dir.path(), "Lang=2\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(user_profile_path(dir.path())).unwrap(),
            "Lang=2\n"
        );
    }
}
