use crate::error::{Error, Result};
use crate::repos::store::normalize_path;
use indicatif::{ProgressBar, ProgressDrawTarget};
use std::io::IsTerminal;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Directories that cannot be repositories and tend to be huge.
const DEFAULT_EXCLUDES: &[&str] = &[
    // Node.js
    "node_modules",
    // Go / PHP
    "vendor",
    // Python
    ".venv",
    "venv",
    "env",
    "__pycache__",
    ".tox",
    // Build outputs
    "dist",
    "build",
    "target",
    "out",
    // Java / Gradle / Maven
    ".gradle",
    ".m2",
    // iOS
    "Pods",
    // Package manager caches
    ".npm",
    ".yarn",
    ".pnpm-store",
    "bower_components",
    // IDE / editor
    ".idea",
    ".vscode",
    // Misc caches
    ".cache",
    ".tmp",
];

/// Recursively scan `root` for git repositories.
///
/// A directory containing `.git` is recorded and not descended into (nested
/// checkouts and submodules are the repository's own business). Symlinked
/// directories are skipped to avoid cycles. `depth` limits recursion, -1
/// means unlimited. `excludes` entries match a directory name, an absolute
/// path, or a path relative to `root`.
pub fn scan_repos(root: &str, depth: i32, excludes: &[String]) -> Result<Vec<String>> {
    let root_path = PathBuf::from(normalize_path(root)?);

    let meta = std::fs::metadata(&root_path)?;
    if !meta.is_dir() {
        return Err(Error::Other(format!(
            "not a directory: {}",
            root_path.display()
        )));
    }

    let excludes: Vec<String> = excludes
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    let bar = scan_progress_bar();
    let mut repos = Vec::new();
    scan_dir(bar.as_ref(), &root_path, &root_path, 0, depth, &excludes, &mut repos)?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    repos.sort();
    Ok(repos)
}

fn scan_dir(
    bar: Option<&ProgressBar>,
    root: &Path,
    dir: &Path,
    current_depth: i32,
    depth_limit: i32,
    excludes: &[String],
    repos: &mut Vec<String>,
) -> Result<()> {
    if let Some(bar) = bar {
        bar.inc(1);
    }

    if dir.join(".git").exists() {
        repos.push(dir.to_string_lossy().to_string());
        if let Some(bar) = bar {
            bar.set_message(format!("scanning ({} found)", repos.len()));
        }
        return Ok(());
    }

    if depth_limit >= 0 && current_depth >= depth_limit {
        return Ok(());
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        // Unreadable directories are skipped, the rest of the tree still scans.
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_dir() || file_type.is_symlink() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".git" {
            continue;
        }
        if DEFAULT_EXCLUDES.contains(&name.as_str()) {
            continue;
        }

        let child = entry.path();
        if is_excluded(root, &child, &name, excludes) {
            continue;
        }

        scan_dir(bar, root, &child, current_depth + 1, depth_limit, excludes, repos)?;
    }

    Ok(())
}

fn is_excluded(root: &Path, path: &Path, name: &str, excludes: &[String]) -> bool {
    for ex in excludes {
        if ex == name {
            return true;
        }

        let ex_path = if ex == "~" || ex.starts_with("~/") {
            match normalize_path(ex) {
                Ok(p) => PathBuf::from(p),
                Err(_) => continue,
            }
        } else if Path::new(ex).is_absolute() {
            Path::new(ex).components().collect()
        } else {
            root.join(Path::new(ex).components().collect::<PathBuf>())
        };

        if path == ex_path {
            return true;
        }
        let prefix = format!("{}{}", ex_path.display(), MAIN_SEPARATOR);
        if path.to_string_lossy().starts_with(&prefix) {
            return true;
        }
    }
    false
}

fn scan_progress_bar() -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.set_message("scanning");
    Some(bar)
}
