use crate::model::{
    CompareMetrics, DayCountMap, DayKey, DayStat, PercentChange, Streak, Summary, WeekdayStat,
};
use chrono::Weekday;

/// Derive the summary metrics from a day-count map. `today` anchors the
/// current-streak calculation.
pub fn calculate_summary(stats: &DayCountMap, today: DayKey) -> Summary {
    let mut out = Summary::default();
    if stats.is_empty() {
        return out;
    }

    let mut weekday_totals = [0u32; 7];
    let mut days: Vec<DayKey> = Vec::with_capacity(stats.len());

    // BTreeMap iteration is date-ordered, so `days` comes out sorted.
    for (&day, &count) in stats {
        if count == 0 {
            continue;
        }

        out.total_commits += count;
        out.active_days += 1;

        if let Some(weekday) = day.weekday() {
            weekday_totals[weekday.num_days_from_sunday() as usize] += count;
        }

        let later = match out.peak_day.date {
            Some(peak) => day > peak,
            None => true,
        };
        if count > out.peak_day.commits || (count == out.peak_day.commits && later) {
            out.peak_day = DayStat {
                date: Some(day),
                commits: count,
            };
        }

        days.push(day);
    }

    if days.is_empty() {
        return out;
    }

    // Current streak: from today backwards, consecutive days with commits.
    if stats.get(&today).copied().unwrap_or(0) > 0 {
        let mut day = Some(today);
        while let Some(d) = day {
            if stats.get(&d).copied().unwrap_or(0) == 0 {
                break;
            }
            out.current_streak += 1;
            day = prev_day(d);
        }
    }

    // Longest streak over all commit days; ties prefer the most recent run.
    let mut cur_start = days[0];
    let mut cur_len = 1u32;
    let mut longest = Streak {
        days: 1,
        start: Some(days[0]),
        end: Some(days[0]),
    };

    for window in days.windows(2) {
        let (prev, day) = (window[0], window[1]);
        if next_day(prev) == Some(day) {
            cur_len += 1;
            continue;
        }

        if cur_len > longest.days || (cur_len == longest.days && Some(prev) > longest.end) {
            longest = Streak {
                days: cur_len,
                start: Some(cur_start),
                end: Some(prev),
            };
        }
        cur_start = day;
        cur_len = 1;
    }

    let last = *days.last().expect("non-empty");
    if cur_len > longest.days || (cur_len == longest.days && Some(last) > longest.end) {
        longest = Streak {
            days: cur_len,
            start: Some(cur_start),
            end: Some(last),
        };
    }
    out.longest_streak = longest;

    // Most active weekday by total commits; ties keep the lowest index
    // (Sunday first).
    let mut most = WeekdayStat {
        weekday: Weekday::Sun,
        commits: weekday_totals[0],
    };
    for index in 1..7 {
        if weekday_totals[index] > most.commits {
            most = WeekdayStat {
                weekday: weekday_from_sunday_index(index),
                commits: weekday_totals[index],
            };
        }
    }
    out.most_active_weekday = most;

    out
}

/// The metric subset the comparison view consumes.
pub fn calculate_compare_metrics(stats: &DayCountMap, today: DayKey) -> CompareMetrics {
    let summary = calculate_summary(stats, today);

    let avg = if summary.active_days > 0 {
        summary.total_commits as f64 / summary.active_days as f64
    } else {
        0.0
    };

    CompareMetrics {
        total_commits: summary.total_commits,
        active_days: summary.active_days,
        avg_commits_per_day: avg,
        most_active_weekday: summary.most_active_weekday.weekday,
        most_active_weekday_commits: summary.most_active_weekday.commits,
        longest_streak_days: summary.longest_streak.days,
    }
}

/// Percent delta `(to-from)/from*100`. `from=0, to=0` is a defined zero;
/// `from=0, to!=0` is undefined and renders as "N/A".
pub fn percent_change(from: f64, to: f64) -> PercentChange {
    if from == 0.0 {
        if to == 0.0 {
            return PercentChange {
                percent: 0.0,
                defined: true,
            };
        }
        return PercentChange {
            percent: 0.0,
            defined: false,
        };
    }
    PercentChange {
        percent: (to - from) / from * 100.0,
        defined: true,
    }
}

/// Deltas between adjacent values; length is `values.len() - 1`.
pub fn percent_changes(values: &[f64]) -> Vec<PercentChange> {
    values
        .windows(2)
        .map(|pair| percent_change(pair[0], pair[1]))
        .collect()
}

pub fn weekday_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

fn weekday_from_sunday_index(index: usize) -> Weekday {
    match index {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

fn prev_day(day: DayKey) -> Option<DayKey> {
    day.to_date()?.pred_opt().map(DayKey::from_date)
}

fn next_day(day: DayKey) -> Option<DayKey> {
    day.to_date()?.succ_opt().map(DayKey::from_date)
}
