use crate::config::IdentityNormalizer;
use crate::error::{Error, Result};
use crate::model::{DayKey, TraversalScope};
use chrono::TimeZone;
use gix::ObjectId;
use std::collections::{HashSet, VecDeque};
use std::path::Path;

pub(crate) fn open_repo(path: &str) -> Result<gix::Repository> {
    if !Path::new(path).exists() {
        return Err(Error::repo(path, "path does not exist"));
    }
    gix::open(path).map_err(|e| Error::repo(path, format!("open: {e}")))
}

pub(crate) fn head_commit_id(repo: &gix::Repository, path: &str) -> Result<ObjectId> {
    let mut head = repo
        .head()
        .map_err(|e| Error::repo(path, format!("HEAD: {e}")))?;
    let commit = head
        .peel_to_commit_in_place()
        .map_err(|e| Error::repo(path, format!("HEAD has no commits: {e}")))?;
    Ok(commit.id)
}

/// Resolve the commit ids that seed the traversal for the given scope.
fn start_points(
    repo: &gix::Repository,
    path: &str,
    scope: &TraversalScope,
) -> Result<Vec<ObjectId>> {
    match scope {
        TraversalScope::Head => Ok(vec![head_commit_id(repo, path)?]),
        TraversalScope::Named(name) => {
            let reference = repo
                .find_reference(name.as_str())
                .map_err(|_| Error::repo(path, format!("branch {name:?} not found")))?;
            let id = reference
                .into_fully_peeled_id()
                .map_err(|e| Error::repo(path, format!("branch {name:?} has no commits: {e}")))?;
            Ok(vec![id.detach()])
        }
        TraversalScope::All => {
            let platform = repo
                .references()
                .map_err(|e| Error::repo(path, format!("list branches: {e}")))?;
            let branches = platform
                .local_branches()
                .map_err(|e| Error::repo(path, format!("list branches: {e}")))?;

            let mut tips = Vec::new();
            let mut seen_tips = HashSet::new();
            for branch in branches {
                let Ok(mut branch) = branch else {
                    continue;
                };
                // Unborn branches have nothing to peel and are skipped.
                let Ok(id) = branch.peel_to_id_in_place() else {
                    continue;
                };
                let id = id.detach();
                if seen_tips.insert(id) {
                    tips.push(id);
                }
            }
            Ok(tips)
        }
    }
}

/// Walk every commit reachable from the scope's start points, invoking
/// `visit(normalized_email, day_key)` for each commit that passes the
/// identity filter and falls inside `[start_key, end_key]`.
///
/// Commits are keyed by their author timestamp, which is NOT monotonic in
/// graph order (amends and rebases routinely disagree), so an out-of-window
/// commit is skipped but its parents are still traversed. The only early cut
/// is the shared seen-set: a commit observed once has had its entire
/// ancestry covered, which is what de-duplicates merge diamonds and, across
/// branch tips, counts each commit exactly once.
pub(crate) fn walk_repo_commits<Tz, F>(
    repo: &gix::Repository,
    path: &str,
    start_key: DayKey,
    end_key: DayKey,
    tz: &Tz,
    email_set: &HashSet<String>,
    scope: &TraversalScope,
    normalize: &IdentityNormalizer,
    mut visit: F,
) -> Result<()>
where
    Tz: TimeZone,
    F: FnMut(&str, DayKey),
{
    let tips = start_points(repo, path, scope)?;
    let mut seen: HashSet<ObjectId> = HashSet::new();

    for tip in tips {
        let mut stack: VecDeque<ObjectId> = VecDeque::from([tip]);

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = repo
                .find_object(commit_id)
                .map_err(|e| Error::repo(path, format!("find commit {commit_id}: {e}")))?
                .into_commit();

            for parent_id in commit.parent_ids() {
                stack.push_back(parent_id.into());
            }

            let author = commit
                .author()
                .map_err(|e| Error::repo(path, format!("decode commit {commit_id}: {e}")))?;

            let email = normalize.normalize(&author.email.to_string());
            if !email_set.is_empty() && !email_set.contains(&email) {
                continue;
            }

            let secs = author.time.seconds;
            let day = DayKey::from_timestamp(secs, tz)
                .ok_or_else(|| Error::repo(path, format!("invalid timestamp: {secs}")))?;
            if day > end_key || day < start_key {
                continue;
            }

            visit(&email, day);
        }
    }

    Ok(())
}

/// Collect one repository into a global day-count map.
pub(crate) fn collect_repo_daily<Tz: TimeZone>(
    repo: &gix::Repository,
    path: &str,
    start_key: DayKey,
    end_key: DayKey,
    tz: &Tz,
    email_set: &HashSet<String>,
    scope: &TraversalScope,
    normalize: &IdentityNormalizer,
) -> Result<crate::model::DayCountMap> {
    let mut out = crate::model::DayCountMap::new();
    walk_repo_commits(
        repo, path, start_key, end_key, tz, email_set, scope, normalize,
        |_, day| {
            *out.entry(day).or_insert(0) += 1;
        },
    )?;
    Ok(out)
}
