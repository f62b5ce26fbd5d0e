use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Calendar date encoded as the ordered integer `year*10000 + month*100 + day`.
///
/// Ordering comparisons stay correct under mixed timezones because the key is
/// derived after conversion into the target zone, and it hashes cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(i32);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        DayKey(date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32)
    }

    /// Derive the day bucket for an epoch timestamp, in the target zone.
    pub fn from_timestamp<Tz: TimeZone>(secs: i64, tz: &Tz) -> Option<Self> {
        let utc = DateTime::<Utc>::from_timestamp(secs, 0)?;
        Some(Self::from_date(utc.with_timezone(tz).date_naive()))
    }

    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            self.0 / 10_000,
            ((self.0 / 100) % 100) as u32,
            (self.0 % 100) as u32,
        )
    }

    pub fn weekday(self) -> Option<Weekday> {
        self.to_date().map(|d| d.weekday())
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Format as `YYYY-MM-DD` (the cache and JSON representation).
    pub fn to_date_string(self) -> String {
        match self.to_date() {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => self.0.to_string(),
        }
    }

    pub fn parse_date_string(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| Error::Parse(format!("day {s:?}: {e}")))?;
        Ok(Self::from_date(date))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_date_string())
    }
}

/// Day bucket -> commit count. A missing key denotes zero; merging is
/// commutative under per-key addition.
pub type DayCountMap = BTreeMap<DayKey, u32>;

/// Raw branch selection as it arrives from the command line.
#[derive(Debug, Clone, Default)]
pub struct BranchScope {
    pub branch: Option<String>,
    pub all_branches: bool,
}

impl BranchScope {
    pub fn named(branch: impl Into<String>) -> Self {
        BranchScope {
            branch: Some(branch.into()),
            all_branches: false,
        }
    }

    pub fn all() -> Self {
        BranchScope {
            branch: None,
            all_branches: true,
        }
    }

    /// Validate and collapse the flag pair into a traversal scope.
    pub fn resolve(&self) -> Result<TraversalScope> {
        let branch = self
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match (branch, self.all_branches) {
            (Some(_), true) => Err(Error::Other(
                "--branch and --all-branches are mutually exclusive".into(),
            )),
            (Some(name), false) => Ok(TraversalScope::Named(name.to_string())),
            (None, true) => Ok(TraversalScope::All),
            (None, false) => Ok(TraversalScope::Head),
        }
    }
}

/// Which branch tip(s) seed history enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalScope {
    /// History reachable from the repository's default head.
    Head,
    /// A single named local branch; fails per-repository if absent.
    Named(String),
    /// Every local branch tip, de-duplicated by commit id across tips.
    All,
}

impl TraversalScope {
    pub fn branch_name(&self) -> &str {
        match self {
            TraversalScope::Named(name) => name,
            _ => "",
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TraversalScope::All)
    }
}

/// A run of consecutive commit days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub days: u32,
    pub start: Option<DayKey>,
    pub end: Option<DayKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayStat {
    pub weekday: Weekday,
    pub commits: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStat {
    pub date: Option<DayKey>,
    pub commits: u32,
}

/// Statistics summary derived from a day-count map.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_commits: u32,
    pub active_days: u32,
    pub current_streak: u32,
    pub longest_streak: Streak,
    pub most_active_weekday: WeekdayStat,
    pub peak_day: DayStat,
}

impl Default for Summary {
    fn default() -> Self {
        Summary {
            total_commits: 0,
            active_days: 0,
            current_streak: 0,
            longest_streak: Streak::default(),
            most_active_weekday: WeekdayStat {
                weekday: Weekday::Sun,
                commits: 0,
            },
            peak_day: DayStat::default(),
        }
    }
}

/// The metric subset consumed by the comparison view.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareMetrics {
    pub total_commits: u32,
    pub active_days: u32,
    pub avg_commits_per_day: f64,
    pub most_active_weekday: Weekday,
    pub most_active_weekday_commits: u32,
    pub longest_streak_days: u32,
}

/// A percent delta that may be undefined (from=0, to!=0 renders as "N/A").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentChange {
    pub percent: f64,
    pub defined: bool,
}

/// An inclusive calendar period with a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RepoRank {
    pub repository: String,
    pub commits: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRanking {
    pub repositories: Vec<RepoRank>,
    pub total_commits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn day_key_encodes_calendar_date() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(DayKey::from_date(d).value(), 20240105);
    }

    #[test]
    fn day_key_round_trips_through_date() {
        let d = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let key = DayKey::from_date(d);
        assert_eq!(key.to_date(), Some(d));
        assert_eq!(DayKey::parse_date_string(&key.to_date_string()).unwrap(), key);
    }

    #[test]
    fn day_key_respects_target_zone() {
        // 2024-01-01 23:30 UTC is already Jan 2 at UTC+8.
        let secs = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        let east = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(
            DayKey::from_timestamp(secs, &Utc).unwrap().value(),
            20240101
        );
        assert_eq!(
            DayKey::from_timestamp(secs, &east).unwrap().value(),
            20240102
        );
    }

    #[test]
    fn branch_scope_rejects_ambiguous_selection() {
        let scope = BranchScope {
            branch: Some("main".into()),
            all_branches: true,
        };
        assert!(scope.resolve().is_err());
    }

    #[test]
    fn branch_scope_resolves_variants() {
        assert_eq!(BranchScope::default().resolve().unwrap(), TraversalScope::Head);
        assert_eq!(
            BranchScope::named("  dev  ").resolve().unwrap(),
            TraversalScope::Named("dev".into())
        );
        assert_eq!(BranchScope::all().resolve().unwrap(), TraversalScope::All);
        // A blank branch name falls back to HEAD.
        assert_eq!(
            BranchScope::named("   ").resolve().unwrap(),
            TraversalScope::Head
        );
    }
}
