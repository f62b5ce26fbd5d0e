use crate::cli::{AddArgs, ListArgs, RemoveArgs};
use crate::config::Config;
use crate::repos::{scan_repos, store::is_valid_repo, RepoStore};
use crate::stats::walker;
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

pub fn exec_add(args: AddArgs) -> anyhow::Result<()> {
    if args.depth < -1 {
        anyhow::bail!("depth must be >= -1, got {}", args.depth);
    }

    let found = scan_repos(&args.folder, args.depth, &args.excludes)?;
    if found.is_empty() {
        println!("no repositories found");
        return Ok(());
    }

    if args.dry_run {
        println!("dry run; repositories found:");
        for path in &found {
            println!("{path}");
        }
        return Ok(());
    }

    let added = RepoStore::open_default()?.add(&found)?;
    if added.is_empty() {
        println!("no new repositories to add");
        return Ok(());
    }

    for path in &added {
        println!("{path}");
    }
    println!("added {} repositories", added.len());
    Ok(())
}

pub fn exec_remove(args: RemoveArgs) -> anyhow::Result<()> {
    let store = RepoStore::open_default()?;

    if args.invalid {
        if args.path.is_some() {
            anyhow::bail!("usage: commitmap remove --invalid");
        }
        let removed = store.remove_invalid()?;
        if removed.is_empty() {
            println!("no invalid repositories");
            return Ok(());
        }
        for path in &removed {
            println!("{path}");
        }
        println!("removed {} repositories", removed.len());
        return Ok(());
    }

    let Some(path) = args.path else {
        anyhow::bail!("usage: commitmap remove <path>");
    };
    if store.remove(&path)? {
        println!("removed {path}");
    } else {
        println!("{path} not in list");
    }
    Ok(())
}

pub fn exec_list(args: ListArgs) -> anyhow::Result<()> {
    let store = RepoStore::open_default()?;
    let repos = store.load()?;
    if repos.is_empty() {
        println!("no repositories added");
        return Ok(());
    }

    if !args.verify {
        for path in &repos {
            println!("{path}");
        }
        return Ok(());
    }

    let (_, invalid) = store.verify()?;
    let invalid: HashSet<String> = invalid.into_iter().collect();
    for path in &repos {
        if invalid.contains(path) {
            println!("{path} (invalid)");
        } else {
            println!("{path}");
        }
    }
    Ok(())
}

const PERFORMANCE_REPO_LIMIT: usize = 50;
const PERFORMANCE_GIT_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;

/// Sequential diagnostics: configuration, repository paths, HEAD
/// reachability, read permissions, performance warnings. Errors produce a
/// non-zero exit; warnings alone do not.
pub fn exec_doctor() -> anyhow::Result<()> {
    println!("Running diagnostics...");

    let mut has_error = false;

    match Config::load() {
        Err(err) => {
            has_error = true;
            println!("❌ Config: {err}");
        }
        Ok(config) => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("✅ Config: OK");
            } else {
                println!("⚠️  Config: {} issue(s)", issues.len());
                print_lines(&issues);
            }
        }
    }

    let valid_repos = match RepoStore::open_default().and_then(|s| s.verify()) {
        Err(err) => {
            has_error = true;
            println!("❌ Repositories: {err}");
            Vec::new()
        }
        Ok((valid, invalid)) => {
            let total = valid.len() + invalid.len();
            if total == 0 {
                println!("⚠️  Repositories: no repositories added");
            } else if invalid.is_empty() {
                println!("✅ Repositories: {}/{} valid", valid.len(), total);
            } else {
                has_error = true;
                println!(
                    "❌ Repositories: {}/{} valid, {} invalid",
                    valid.len(),
                    total,
                    invalid.len()
                );
                print_lines(&invalid);
            }
            valid
        }
    };

    if valid_repos.is_empty() {
        println!("⚠️  Branch reachability: skipped (no valid repositories)");
        println!("⚠️  Permissions: skipped (no valid repositories)");
    } else {
        let branch_errors: Vec<String> = valid_repos
            .iter()
            .filter_map(|path| check_head_reachability(path).err().map(|e| e.to_string()))
            .collect();
        if branch_errors.is_empty() {
            println!("✅ Branch reachability: OK");
        } else {
            has_error = true;
            println!("❌ Branch reachability: {} issue(s)", branch_errors.len());
            print_lines(&branch_errors);
        }

        let permission_errors: Vec<String> = valid_repos
            .iter()
            .filter_map(|path| check_permissions(path).err().map(|e| e.to_string()))
            .collect();
        if permission_errors.is_empty() {
            println!("✅ Permissions: OK");
        } else {
            has_error = true;
            println!("❌ Permissions: {} issue(s)", permission_errors.len());
            print_lines(&permission_errors);
        }
    }

    let performance_warnings = check_performance(&valid_repos);
    if performance_warnings.is_empty() {
        println!("✅ Performance: OK");
    } else {
        println!("⚠️  Performance: {} warning(s)", performance_warnings.len());
        print_lines(&performance_warnings);
    }

    if has_error {
        anyhow::bail!("doctor found issues");
    }
    Ok(())
}

fn check_head_reachability(path: &str) -> crate::error::Result<()> {
    let repo = walker::open_repo(path)?;
    walker::head_commit_id(&repo, path)?;
    Ok(())
}

fn check_permissions(path: &str) -> std::io::Result<()> {
    std::fs::File::open(Path::new(path).join(".git").join("HEAD")).map(|_| ())
}

fn check_performance(valid_repos: &[String]) -> Vec<String> {
    let mut warnings = Vec::new();

    if valid_repos.len() > PERFORMANCE_REPO_LIMIT {
        warnings.push(format!(
            "{} repositories added; queries may be slow (consider pruning)",
            valid_repos.len()
        ));
    }

    for path in valid_repos {
        let git_dir = Path::new(path).join(".git");
        if !git_dir.is_dir() {
            continue;
        }
        let size: u64 = WalkDir::new(&git_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.metadata().ok())
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .sum();
        if size > PERFORMANCE_GIT_SIZE_LIMIT {
            warnings.push(format!(
                "{path}: .git is {:.1} GiB; scans may be slow",
                size as f64 / PERFORMANCE_GIT_SIZE_LIMIT as f64
            ));
        }
    }

    warnings
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("   - {line}");
    }
}
