use crate::model::{DayCountMap, RepoRank, RepoRanking};
use std::collections::BTreeMap;

/// Rank repositories by commit count.
///
/// `limit` of 0 returns every repository. Rows sort by commits descending,
/// path ascending on ties. Percentages are allocated in 0.1% units via the
/// largest-remainder method so the printed values sum to exactly 100.0 when
/// the total is non-zero.
pub fn rank_repositories(stats_per_repo: &BTreeMap<String, DayCountMap>, limit: usize) -> RepoRanking {
    let mut rows: Vec<RepoRank> = stats_per_repo
        .iter()
        .map(|(path, daily)| RepoRank {
            repository: path.clone(),
            commits: daily.values().map(|&c| c as u64).sum(),
            percent: 0.0,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| a.repository.cmp(&b.repository))
    });

    if limit > 0 && limit < rows.len() {
        rows.truncate(limit);
    }

    let total_commits: u64 = rows.iter().map(|r| r.commits).sum();
    if total_commits == 0 {
        return RepoRanking {
            repositories: rows,
            total_commits: 0,
        };
    }

    // 0.1% units: 100.0% == 1000.
    const TOTAL_UNITS: u64 = 1000;

    struct Remainder {
        index: usize,
        remainder: u64,
        commits: u64,
    }

    let mut units = vec![0u64; rows.len()];
    let mut remainders = Vec::with_capacity(rows.len());
    let mut allocated = 0u64;

    for (index, row) in rows.iter().enumerate() {
        let numerator = row.commits * TOTAL_UNITS;
        units[index] = numerator / total_commits;
        allocated += units[index];
        remainders.push(Remainder {
            index,
            remainder: numerator % total_commits,
            commits: row.commits,
        });
    }

    let deficit = TOTAL_UNITS - allocated;
    if deficit > 0 {
        remainders.sort_by(|a, b| {
            b.remainder
                .cmp(&a.remainder)
                .then_with(|| b.commits.cmp(&a.commits))
                .then_with(|| rows[a.index].repository.cmp(&rows[b.index].repository))
        });
        for extra in remainders.iter().take(deficit as usize) {
            units[extra.index] += 1;
        }
    }

    for (index, row) in rows.iter_mut().enumerate() {
        row.percent = units[index] as f64 / 10.0;
    }

    RepoRanking {
        repositories: rows,
        total_commits,
    }
}
