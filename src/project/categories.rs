//! Project and category discovery
//!
//! A project is any subdirectory of the websites directory that holds a
//! `hts-cache/winprofile.ini`. Categories come from the `category=` line of
//! each project profile.

use super::{CACHE_DIR, PROFILE_FILE};
use crate::project::profile::parse_profile;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Result of scanning the websites directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectCategories {
    /// Newline-separated project names, sorted
    pub profiles: String,
    /// Newline-separated distinct categories, in project order
    pub categories: String,
}

/// Scan `root` for projects and their categories
///
/// An unreadable or missing directory yields empty lists.
pub fn scan_categories(root: &Path) -> ProjectCategories {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {:?} for projects: {}", root, e);
            return ProjectCategories::default();
        }
    };

    let mut projects: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| entry.path().join(CACHE_DIR).join(PROFILE_FILE).is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    projects.sort();

    let mut categories: Vec<String> = Vec::new();
    for project in &projects {
        let profile = root.join(project).join(CACHE_DIR).join(PROFILE_FILE);
        let Ok(bytes) = fs::read(&profile) else {
            continue;
        };
        for (key, value) in parse_profile(&String::from_utf8_lossy(&bytes)) {
            if key.eq_ignore_ascii_case("category") && !value.is_empty() && !categories.contains(&value) {
                categories.push(value);
            }
        }
    }

    debug!(
        "Found {} projects and {} categories in {:?}",
        projects.len(),
        categories.len(),
        root
    );

    ProjectCategories {
        profiles: projects.join("\n"),
        categories: categories.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(root: &Path, name: &str, profile: &str) {
        let cache = root.join(name).join(CACHE_DIR);
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join(PROFILE_FILE), profile).unwrap();
    }

    #[test]
    fn test_scan_categories() {
        let dir = TempDir::new().unwrap();
        project(dir.path(), "zeta", "Category=News\n");
        project(dir.path(), "alpha", "category=Docs%20sites\nDepth=3\n");
        project(dir.path(), "beta", "Category=News\n");
        std::fs::create_dir_all(dir.path().join("not-a-project")).unwrap();

        let found = scan_categories(dir.path());
        assert_eq!(found.profiles, "alpha\nbeta\nzeta");
        assert_eq!(found.categories, "Docs sites\nNews");
    }

    #[test]
    fn test_scan_missing_dir() {
        let dir = TempDir::new().unwrap();
        let found = scan_categories(&dir.path().join("nowhere"));
        assert_eq!(found, ProjectCategories::default());
    }
}
