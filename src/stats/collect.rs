use crate::cache::{from_cached_stats, CacheKey, CacheStore};
use crate::config::IdentityNormalizer;
use crate::error::{Error, Result};
use crate::model::{BranchScope, DayCountMap, DayKey, TraversalScope};
use crate::stats::walker;
use chrono::{DateTime, TimeZone};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::io::IsTerminal;
use std::sync::Mutex;

/// Parameters shared by every collection entry point. Time bounds are passed
/// separately so the options stay timezone-agnostic.
#[derive(Debug, Clone)]
pub struct CollectOptions<'a> {
    pub repos: &'a [String],
    pub emails: &'a [String],
    pub scope: BranchScope,
    pub use_cache: bool,
    pub normalizer: &'a IdentityNormalizer,
}

/// A collection result plus the per-repository failures that occurred along
/// the way. An empty result with failures present is a total failure; a
/// non-empty one is a partial success the caller surfaces as a warning.
#[derive(Debug)]
pub struct Collected<T> {
    pub stats: T,
    pub failures: Vec<Error>,
}

impl<T> Collected<T> {
    pub fn joined_failure(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

struct Prepared {
    start_key: DayKey,
    end_key: DayKey,
    scope: TraversalScope,
    email_set: HashSet<String>,
}

fn prepare<Tz: TimeZone>(
    opts: &CollectOptions<'_>,
    since: &DateTime<Tz>,
    until: &DateTime<Tz>,
) -> Result<Prepared> {
    let scope = opts.scope.resolve()?;

    // Day keys are derived in the end-of-window's zone.
    let tz = until.timezone();
    let start_key = DayKey::from_date(since.with_timezone(&tz).date_naive());
    let end_key = DayKey::from_date(until.with_timezone(&tz).date_naive());
    if start_key > end_key {
        return Err(Error::InvalidDate(format!(
            "start must be <= end (start={start_key}, end={end_key})"
        )));
    }

    let mut email_set = HashSet::with_capacity(opts.emails.len());
    for email in opts.emails {
        if email.trim().is_empty() {
            continue;
        }
        let normalized = opts.normalizer.normalize(email);
        if !normalized.is_empty() {
            email_set.insert(normalized);
        }
    }

    Ok(Prepared {
        start_key,
        end_key,
        scope,
        email_set,
    })
}

/// Fan the per-repository closure out over a pool sized to the host CPU
/// count, merging successes and collecting failures under separate locks.
/// Output is interleaving-invariant: merges are commutative additions or
/// writes to distinct keys.
fn run_pool<T, C, A>(repos: &[String], collect_fn: C, aggregate: A) -> Result<Vec<Error>>
where
    T: Send,
    C: Fn(&str) -> Result<T> + Sync,
    A: FnMut(&str, T) + Send,
{
    let aggregate = Mutex::new(aggregate);
    let failures: Mutex<Vec<Error>> = Mutex::new(Vec::new());
    let bar = repo_progress_bar(repos.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build()
        .map_err(|e| Error::Other(format!("worker pool: {e}")))?;

    pool.install(|| {
        repos.par_iter().for_each(|repo_path| {
            match collect_fn(repo_path) {
                Ok(result) => {
                    let mut merge = aggregate.lock().expect("aggregate lock");
                    (*merge)(repo_path, result);
                }
                Err(err) => {
                    failures.lock().expect("failure lock").push(err);
                }
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        });
    });

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(failures.into_inner().expect("failure lock"))
}

/// Advisory progress, shown only for multi-repository runs on a terminal.
fn repo_progress_bar(total: usize) -> Option<ProgressBar> {
    if total <= 1 || !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::with_template("collecting stats {pos}/{len} {bar:24}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    Some(bar)
}

/// Merged day-count map across all repositories. This is the cached path:
/// each repository's map is memoized under its full parameter fingerprint.
pub fn collect_stats<Tz>(
    opts: &CollectOptions<'_>,
    since: &DateTime<Tz>,
    until: &DateTime<Tz>,
) -> Result<Collected<DayCountMap>>
where
    Tz: TimeZone + Sync,
{
    let prepared = prepare(opts, since, until)?;
    let tz = until.timezone();
    let store = open_store(opts.use_cache);

    let mut out = DayCountMap::new();
    let failures = run_pool(
        opts.repos,
        |path| collect_repo_cached(path, &prepared, &tz, opts.normalizer, store.as_ref()),
        |_, daily: DayCountMap| {
            for (day, count) in daily {
                *out.entry(day).or_insert(0) += count;
            }
        },
    )?;

    Ok(Collected {
        stats: out,
        failures,
    })
}

/// One day-count map per repository path. Not cached: each walker writes to
/// a distinct key and the ranking caller re-folds anyway.
pub fn collect_stats_per_repo<Tz>(
    opts: &CollectOptions<'_>,
    since: &DateTime<Tz>,
    until: &DateTime<Tz>,
) -> Result<Collected<BTreeMap<String, DayCountMap>>>
where
    Tz: TimeZone + Sync,
{
    let prepared = prepare(opts, since, until)?;
    let tz = until.timezone();

    let mut out = BTreeMap::new();
    let failures = run_pool(
        opts.repos,
        |path| {
            let repo = walker::open_repo(path)?;
            walker::collect_repo_daily(
                &repo,
                path,
                prepared.start_key,
                prepared.end_key,
                &tz,
                &prepared.email_set,
                &prepared.scope,
                opts.normalizer,
            )
        },
        |path, daily: DayCountMap| {
            out.insert(path.to_string(), daily);
        },
    )?;

    Ok(Collected {
        stats: out,
        failures,
    })
}

/// Day-count maps bucketed by canonical identity, collected in one pass over
/// every repository. Not cached: the bucketing defeats the fixed-key
/// fingerprint and the payloads are larger.
pub fn collect_stats_by_emails<Tz>(
    opts: &CollectOptions<'_>,
    since: &DateTime<Tz>,
    until: &DateTime<Tz>,
) -> Result<Collected<BTreeMap<String, DayCountMap>>>
where
    Tz: TimeZone + Sync,
{
    let prepared = prepare(opts, since, until)?;
    let tz = until.timezone();

    let mut out: BTreeMap<String, DayCountMap> = BTreeMap::new();
    let failures = run_pool(
        opts.repos,
        |path| {
            let repo = walker::open_repo(path)?;
            let mut buckets: BTreeMap<String, DayCountMap> = BTreeMap::new();
            walker::walk_repo_commits(
                &repo,
                path,
                prepared.start_key,
                prepared.end_key,
                &tz,
                &prepared.email_set,
                &prepared.scope,
                opts.normalizer,
                |email, day| {
                    *buckets
                        .entry(email.to_string())
                        .or_default()
                        .entry(day)
                        .or_insert(0) += 1;
                },
            )?;
            Ok(buckets)
        },
        |_, buckets: BTreeMap<String, DayCountMap>| {
            for (email, daily) in buckets {
                let target = out.entry(email).or_default();
                for (day, count) in daily {
                    *target.entry(day).or_insert(0) += count;
                }
            }
        },
    )?;

    Ok(Collected {
        stats: out,
        failures,
    })
}

fn open_store(use_cache: bool) -> Option<CacheStore> {
    if !use_cache {
        return None;
    }
    // A cache that cannot be opened degrades to no cache at all.
    CacheStore::open_default().ok()
}

fn collect_repo_cached<Tz: TimeZone>(
    path: &str,
    prepared: &Prepared,
    tz: &Tz,
    normalizer: &IdentityNormalizer,
    store: Option<&CacheStore>,
) -> Result<DayCountMap> {
    let repo = walker::open_repo(path)?;

    let key = match store {
        Some(_) => Some(build_repo_cache_key(
            path,
            &walker::head_commit_id(&repo, path)?.to_string(),
            prepared.start_key,
            prepared.end_key,
            &prepared.email_set,
            &prepared.scope,
        )),
        None => None,
    };

    if let (Some(store), Some(key)) = (store, key.as_ref()) {
        // Unreadable or undecodable entries degrade to a miss.
        if let Ok(Some(entry)) = store.load(key) {
            if let Ok(daily) = from_cached_stats(&entry.stats) {
                return Ok(daily);
            }
        }
    }

    let daily = walker::collect_repo_daily(
        &repo,
        path,
        prepared.start_key,
        prepared.end_key,
        tz,
        &prepared.email_set,
        &prepared.scope,
        normalizer,
    )?;

    if let (Some(store), Some(key)) = (store, key.as_ref()) {
        // Write failures are non-fatal; the next run simply recomputes.
        let _ = store.save(key, &daily);
    }

    Ok(daily)
}

fn build_repo_cache_key(
    path: &str,
    head_hash: &str,
    start_key: DayKey,
    end_key: DayKey,
    email_set: &HashSet<String>,
    scope: &TraversalScope,
) -> CacheKey {
    let mut emails: Vec<String> = email_set.iter().cloned().collect();
    emails.sort();
    CacheKey {
        repo_path: path.to_string(),
        head_hash: head_hash.to_string(),
        emails,
        time_range: format!("{}_{}", start_key.to_date_string(), end_key.to_date_string()),
        branch: scope.branch_name().to_string(),
        all_branches: scope.is_all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32) -> DayKey {
        DayKey::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn cache_key_reflects_all_parameters() {
        let mut emails = HashSet::new();
        emails.insert("b@x.com".to_string());
        emails.insert("a@x.com".to_string());

        let key = build_repo_cache_key(
            "/tmp/repo",
            "deadbeef",
            day(2024, 1, 1),
            day(2024, 6, 30),
            &emails,
            &TraversalScope::Named("dev".into()),
        );
        assert_eq!(key.repo_path, "/tmp/repo");
        assert_eq!(key.head_hash, "deadbeef");
        assert_eq!(key.emails, vec!["a@x.com", "b@x.com"]);
        assert_eq!(key.time_range, "2024-01-01_2024-06-30");
        assert_eq!(key.branch, "dev");
        assert!(!key.all_branches);

        let all = build_repo_cache_key(
            "/tmp/repo",
            "deadbeef",
            day(2024, 1, 1),
            day(2024, 6, 30),
            &emails,
            &TraversalScope::All,
        );
        assert_eq!(all.branch, "");
        assert!(all.all_branches);
    }

    #[test]
    fn prepare_normalizes_filter_emails() {
        use crate::config::{Alias, Config};

        let cfg = Config {
            aliases: vec![Alias {
                name: "Alice".into(),
                emails: vec!["alice@work.com".into(), "alice@home.com".into()],
            }],
            ..Config::default()
        };
        let normalizer = cfg.normalizer();
        let emails = vec![
            " alice@home.com ".to_string(),
            String::new(),
            "bob@x.com".to_string(),
        ];
        let opts = CollectOptions {
            repos: &[],
            emails: &emails,
            scope: BranchScope::default(),
            use_cache: false,
            normalizer: &normalizer,
        };
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();

        let prepared = prepare(&opts, &since, &until).unwrap();
        assert!(prepared.email_set.contains("alice@work.com"));
        assert!(prepared.email_set.contains("bob@x.com"));
        assert_eq!(prepared.email_set.len(), 2);
        assert_eq!(prepared.start_key, day(2024, 1, 1));
        assert_eq!(prepared.end_key, day(2024, 1, 31));
    }

    #[test]
    fn prepare_rejects_inverted_window() {
        let normalizer = IdentityNormalizer::passthrough();
        let opts = CollectOptions {
            repos: &[],
            emails: &[],
            scope: BranchScope::default(),
            use_cache: false,
            normalizer: &normalizer,
        };
        let since = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(prepare(&opts, &since, &until).is_err());
    }

    #[test]
    fn prepare_rejects_ambiguous_scope() {
        let normalizer = IdentityNormalizer::passthrough();
        let opts = CollectOptions {
            repos: &[],
            emails: &[],
            scope: BranchScope {
                branch: Some("main".into()),
                all_branches: true,
            },
            use_cache: false,
            normalizer: &normalizer,
        };
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(prepare(&opts, &t, &t).is_err());
    }

    #[test]
    fn empty_repo_list_returns_empty_result() {
        let normalizer = IdentityNormalizer::passthrough();
        let opts = CollectOptions {
            repos: &[],
            emails: &[],
            scope: BranchScope::default(),
            use_cache: false,
            normalizer: &normalizer,
        };
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();

        let collected = collect_stats(&opts, &since, &until).unwrap();
        assert!(collected.stats.is_empty());
        assert!(collected.failures.is_empty());
        assert!(collected.joined_failure().is_none());
    }

    #[test]
    fn missing_repo_is_reported_not_fatal() {
        let normalizer = IdentityNormalizer::passthrough();
        let repos = vec!["/definitely/not/a/repo".to_string()];
        let opts = CollectOptions {
            repos: &repos,
            emails: &[],
            scope: BranchScope::default(),
            use_cache: false,
            normalizer: &normalizer,
        };
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();

        let collected = collect_stats(&opts, &since, &until).unwrap();
        assert!(collected.stats.is_empty());
        assert_eq!(collected.failures.len(), 1);
        let joined = collected.joined_failure().unwrap();
        assert!(joined.contains("/definitely/not/a/repo"));
    }
}
