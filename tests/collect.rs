use chrono::{TimeZone, Utc};
use commitmap::config::{Alias, Config, IdentityNormalizer};
use commitmap::model::{BranchScope, DayKey};
use commitmap::stats::{
    collect_stats, collect_stats_by_emails, collect_stats_per_repo, CollectOptions,
};
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed in {dir:?}");
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "--quiet"]);
    git(dir, &["checkout", "-q", "-b", "main"]);
}

fn commit_at(dir: &Path, name: &str, email: &str, date: &str) {
    let path = dir.join(name);
    let previous = std::fs::read_to_string(&path).unwrap_or_default();
    std::fs::write(&path, format!("{previous}{email} {date}\n")).unwrap();

    git(dir, &["add", "."]);
    let status = Command::new("git")
        .args(["commit", "-q", "-m", &format!("change {name}")])
        .current_dir(dir)
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", email)
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", email)
        .env("GIT_COMMITTER_DATE", date)
        .status()
        .unwrap();
    assert!(status.success());
}

fn day(y: i32, m: u32, d: u32) -> DayKey {
    DayKey::from_date(chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn january_window() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
    )
}

#[test]
fn global_collection_filters_by_identity_and_window() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let repo_a = base.path().join("a");
    let repo_b = base.path().join("b");
    std::fs::create_dir_all(&repo_a).unwrap();
    std::fs::create_dir_all(&repo_b).unwrap();

    init_repo(&repo_a);
    commit_at(&repo_a, "f.txt", "a@x.com", "2024-01-02T10:00:00+00:00");
    commit_at(&repo_a, "f.txt", "a@x.com", "2024-01-02T11:00:00+00:00");
    commit_at(&repo_a, "f.txt", "a@x.com", "2024-01-05T10:00:00+00:00");

    init_repo(&repo_b);
    commit_at(&repo_b, "g.txt", "b@x.com", "2024-01-02T10:00:00+00:00");

    let repos = vec![
        repo_a.to_string_lossy().to_string(),
        repo_b.to_string_lossy().to_string(),
    ];
    let emails = vec!["a@x.com".to_string()];
    let normalizer = IdentityNormalizer::passthrough();
    let opts = CollectOptions {
        repos: &repos,
        emails: &emails,
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let (since, until) = january_window();

    let collected = collect_stats(&opts, &since, &until).unwrap();
    assert!(collected.failures.is_empty());
    assert_eq!(collected.stats.get(&day(2024, 1, 2)), Some(&2));
    assert_eq!(collected.stats.get(&day(2024, 1, 5)), Some(&1));
    assert_eq!(collected.stats.len(), 2);
}

#[test]
fn out_of_order_author_dates_do_not_lose_commits() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let repo = base.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    init_repo(&repo);

    // Author dates are deliberately non-monotonic in graph order.
    for date in [
        "2024-01-08T10:00:00+00:00",
        "2024-01-15T10:00:00+00:00",
        "2024-01-10T10:00:00+00:00",
        "2024-01-20T10:00:00+00:00",
        "2024-01-25T10:00:00+00:00",
    ] {
        commit_at(&repo, "f.txt", "t@x.com", date);
    }

    let repos = vec![repo.to_string_lossy().to_string()];
    let normalizer = IdentityNormalizer::passthrough();
    let opts = CollectOptions {
        repos: &repos,
        emails: &[],
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let since = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();

    let collected = collect_stats(&opts, &since, &until).unwrap();
    assert!(collected.failures.is_empty());
    // The in-window commits on the 10th, 15th, and 20th are all present even
    // though an older author date sits between them in graph order, and the
    // window bounds themselves are inclusive.
    assert_eq!(collected.stats.get(&day(2024, 1, 10)), Some(&1));
    assert_eq!(collected.stats.get(&day(2024, 1, 15)), Some(&1));
    assert_eq!(collected.stats.get(&day(2024, 1, 20)), Some(&1));
    assert_eq!(collected.stats.len(), 3);
}

#[test]
fn by_email_buckets_match_global_totals() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let repo = base.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    init_repo(&repo);

    commit_at(&repo, "f.txt", "alice@x.com", "2024-01-01T10:00:00+00:00");
    commit_at(&repo, "f.txt", "bob@x.com", "2024-01-02T10:00:00+00:00");
    commit_at(&repo, "f.txt", "alice@x.com", "2024-01-03T10:00:00+00:00");
    commit_at(&repo, "f.txt", "alice@x.com", "2024-01-03T11:00:00+00:00");

    let repos = vec![repo.to_string_lossy().to_string()];
    let emails = vec!["alice@x.com".to_string(), "bob@x.com".to_string()];
    let normalizer = IdentityNormalizer::passthrough();
    let opts = CollectOptions {
        repos: &repos,
        emails: &emails,
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let (since, until) = january_window();

    let by_email = collect_stats_by_emails(&opts, &since, &until).unwrap();
    assert!(by_email.failures.is_empty());

    let alice = &by_email.stats["alice@x.com"];
    assert_eq!(alice.get(&day(2024, 1, 1)), Some(&1));
    assert_eq!(alice.get(&day(2024, 1, 3)), Some(&2));
    let bob = &by_email.stats["bob@x.com"];
    assert_eq!(bob.get(&day(2024, 1, 2)), Some(&1));

    // Summing the identity buckets by day reproduces the global view.
    let global = collect_stats(&opts, &since, &until).unwrap().stats;
    let mut summed = commitmap::model::DayCountMap::new();
    for daily in by_email.stats.values() {
        for (&d, &c) in daily {
            *summed.entry(d).or_insert(0) += c;
        }
    }
    assert_eq!(summed, global);
}

#[test]
fn alias_members_all_collapse_to_the_primary() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let repo = base.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    init_repo(&repo);

    commit_at(&repo, "f.txt", "alice@work.com", "2024-01-02T10:00:00+00:00");
    commit_at(&repo, "f.txt", "alice@home.com", "2024-01-03T10:00:00+00:00");
    commit_at(&repo, "f.txt", "alice@work.com", "2024-01-04T10:00:00+00:00");

    let config = Config {
        aliases: vec![Alias {
            name: "Alice".into(),
            emails: vec!["alice@work.com".into(), "alice@home.com".into()],
        }],
        ..Config::default()
    };
    let normalizer = config.normalizer();

    let repos = vec![repo.to_string_lossy().to_string()];
    // Filtering by a secondary member catches commits from every member.
    let emails = vec!["alice@home.com".to_string()];
    let opts = CollectOptions {
        repos: &repos,
        emails: &emails,
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let (since, until) = january_window();

    let collected = collect_stats(&opts, &since, &until).unwrap();
    assert!(collected.failures.is_empty());
    let total: u32 = collected.stats.values().sum();
    assert_eq!(total, 3);

    let by_email = collect_stats_by_emails(&opts, &since, &until).unwrap();
    assert_eq!(by_email.stats.len(), 1);
    let total: u32 = by_email.stats["alice@work.com"].values().sum();
    assert_eq!(total, 3);
}

#[test]
fn all_branches_counts_each_commit_once() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let repo = base.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    init_repo(&repo);

    // Shared ancestor, a feature branch with one commit, then three more on
    // main: 5 distinct commits reachable across both tips.
    commit_at(&repo, "f.txt", "u@x.com", "2024-01-01T10:00:00+00:00");
    git(&repo, &["checkout", "-q", "-b", "feature"]);
    commit_at(&repo, "feat.txt", "u@x.com", "2024-01-02T10:00:00+00:00");
    git(&repo, &["checkout", "-q", "main"]);
    commit_at(&repo, "f.txt", "u@x.com", "2024-01-03T10:00:00+00:00");
    commit_at(&repo, "f.txt", "u@x.com", "2024-01-04T10:00:00+00:00");
    commit_at(&repo, "f.txt", "u@x.com", "2024-01-05T10:00:00+00:00");

    let repos = vec![repo.to_string_lossy().to_string()];
    let emails = vec!["u@x.com".to_string()];
    let normalizer = IdentityNormalizer::passthrough();
    let (since, until) = january_window();

    let all = CollectOptions {
        repos: &repos,
        emails: &emails,
        scope: BranchScope::all(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let collected = collect_stats(&all, &since, &until).unwrap();
    assert!(collected.failures.is_empty());
    let total: u32 = collected.stats.values().sum();
    // The shared ancestor is reachable from both tips but counted once.
    assert_eq!(total, 5);

    let head_only = CollectOptions {
        repos: &repos,
        emails: &emails,
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let collected = collect_stats(&head_only, &since, &until).unwrap();
    let total: u32 = collected.stats.values().sum();
    assert_eq!(total, 4);

    let named = CollectOptions {
        repos: &repos,
        emails: &emails,
        scope: BranchScope::named("feature"),
        use_cache: false,
        normalizer: &normalizer,
    };
    let collected = collect_stats(&named, &since, &until).unwrap();
    let total: u32 = collected.stats.values().sum();
    assert_eq!(total, 2);
}

#[test]
fn missing_branch_fails_only_that_repository() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let with_branch = base.path().join("with_branch");
    let without_branch = base.path().join("without_branch");
    std::fs::create_dir_all(&with_branch).unwrap();
    std::fs::create_dir_all(&without_branch).unwrap();

    init_repo(&with_branch);
    commit_at(&with_branch, "f.txt", "u@x.com", "2024-01-02T10:00:00+00:00");
    git(&with_branch, &["checkout", "-q", "-b", "dev"]);
    commit_at(&with_branch, "f.txt", "u@x.com", "2024-01-03T10:00:00+00:00");

    init_repo(&without_branch);
    commit_at(&without_branch, "g.txt", "u@x.com", "2024-01-04T10:00:00+00:00");

    let repos = vec![
        with_branch.to_string_lossy().to_string(),
        without_branch.to_string_lossy().to_string(),
    ];
    let normalizer = IdentityNormalizer::passthrough();
    let opts = CollectOptions {
        repos: &repos,
        emails: &[],
        scope: BranchScope::named("dev"),
        use_cache: false,
        normalizer: &normalizer,
    };
    let (since, until) = january_window();

    let collected = collect_stats(&opts, &since, &until).unwrap();
    // The repository with the branch contributes; the other is reported.
    let total: u32 = collected.stats.values().sum();
    assert_eq!(total, 2);
    assert_eq!(collected.failures.len(), 1);
    let joined = collected.joined_failure().unwrap();
    assert!(joined.contains("dev"));
    assert!(joined.contains(&without_branch.to_string_lossy().to_string()));
}

#[test]
fn per_repo_keying_sums_to_global() {
    if !has_git() {
        return;
    }
    let base = tempdir().unwrap();
    let repo_a = base.path().join("a");
    let repo_b = base.path().join("b");
    std::fs::create_dir_all(&repo_a).unwrap();
    std::fs::create_dir_all(&repo_b).unwrap();

    init_repo(&repo_a);
    commit_at(&repo_a, "f.txt", "u@x.com", "2024-01-02T10:00:00+00:00");
    commit_at(&repo_a, "f.txt", "u@x.com", "2024-01-03T10:00:00+00:00");
    init_repo(&repo_b);
    commit_at(&repo_b, "g.txt", "u@x.com", "2024-01-02T10:00:00+00:00");

    let repos = vec![
        repo_a.to_string_lossy().to_string(),
        repo_b.to_string_lossy().to_string(),
    ];
    let normalizer = IdentityNormalizer::passthrough();
    let opts = CollectOptions {
        repos: &repos,
        emails: &[],
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let (since, until) = january_window();

    let per_repo = collect_stats_per_repo(&opts, &since, &until).unwrap();
    assert!(per_repo.failures.is_empty());
    assert_eq!(per_repo.stats.len(), 2);

    let mut summed = commitmap::model::DayCountMap::new();
    for daily in per_repo.stats.values() {
        for (&d, &c) in daily {
            *summed.entry(d).or_insert(0) += c;
        }
    }
    let global = collect_stats(&opts, &since, &until).unwrap().stats;
    assert_eq!(summed, global);
}
