use crate::config;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const REPOS_FILE_NAME: &str = "repos";

/// Normalize a user-supplied repository path: trim, expand `~`, absolutize,
/// and clean redundant separators.
pub fn normalize_path(p: &str) -> Result<String> {
    let p = p.trim();
    if p.is_empty() {
        return Err(Error::Other("empty path".into()));
    }

    let expanded: PathBuf = if p == "~" {
        dirs::home_dir().ok_or_else(|| Error::Other("could not determine home directory".into()))?
    } else if let Some(rest) = p.strip_prefix("~/") {
        dirs::home_dir()
            .ok_or_else(|| Error::Other("could not determine home directory".into()))?
            .join(rest)
    } else {
        PathBuf::from(p)
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let cleaned: PathBuf = absolute.components().collect();
    Ok(cleaned.to_string_lossy().to_string())
}

/// A path is a usable repository when it is a directory containing `.git`.
pub fn is_valid_repo(path: &str) -> bool {
    let p = Path::new(path);
    p.is_dir() && p.join(".git").exists()
}

/// The persisted repository-path list: one absolute path per line under the
/// configuration directory. The core never owns the repositories themselves.
#[derive(Debug, Clone)]
pub struct RepoStore {
    path: PathBuf,
}

impl RepoStore {
    pub fn open_default() -> Result<Self> {
        Ok(RepoStore {
            path: config::dir()?.join(REPOS_FILE_NAME),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        RepoStore { path: path.into() }
    }

    /// Load the list, normalized and deduplicated in order. A missing file
    /// means "nothing added yet" and yields an empty list.
    pub fn load(&self) -> Result<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut seen = HashSet::new();
        let mut repos = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let normalized = normalize_path(line)?;
            if seen.insert(normalized.clone()) {
                repos.push(normalized);
            }
        }
        Ok(repos)
    }

    fn save(&self, repos: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            config::create_private_dir(parent)?;
        }
        let mut data = repos.join("\n");
        if !repos.is_empty() {
            data.push('\n');
        }
        std::fs::write(&self.path, data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Add paths that are not yet present; returns the ones actually added.
    pub fn add(&self, paths: &[String]) -> Result<Vec<String>> {
        let mut repos = self.load()?;
        let mut existing: HashSet<String> = repos.iter().cloned().collect();

        let mut added = Vec::new();
        for path in paths {
            let normalized = normalize_path(path)?;
            if existing.insert(normalized.clone()) {
                added.push(normalized);
            }
        }

        if added.is_empty() {
            return Ok(added);
        }
        repos.extend(added.iter().cloned());
        self.save(&repos)?;
        Ok(added)
    }

    /// Remove one path; absent paths are ignored. Returns whether anything
    /// was removed.
    pub fn remove(&self, path: &str) -> Result<bool> {
        let normalized = normalize_path(path)?;
        let repos = self.load()?;
        let kept: Vec<String> = repos.iter().filter(|p| **p != normalized).cloned().collect();
        let removed = kept.len() != repos.len();
        if removed {
            self.save(&kept)?;
        }
        Ok(removed)
    }

    /// Drop every path that no longer points at a git repository; returns the
    /// removed paths.
    pub fn remove_invalid(&self) -> Result<Vec<String>> {
        let repos = self.load()?;
        let (kept, removed): (Vec<String>, Vec<String>) =
            repos.into_iter().partition(|p| is_valid_repo(p));
        if !removed.is_empty() {
            self.save(&kept)?;
        }
        Ok(removed)
    }

    /// Split the stored list into valid and invalid repositories.
    pub fn verify(&self) -> Result<(Vec<String>, Vec<String>)> {
        let repos = self.load()?;
        Ok(repos.into_iter().partition(|p| is_valid_repo(p)))
    }
}
