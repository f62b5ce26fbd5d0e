use crate::model::{DayCountMap, DayKey, Summary};
use crate::stats::summary::weekday_abbrev;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use console::Style;
use std::fmt::Write as _;

const SUMMARY_RULE_LEN: usize = 36;

#[derive(Debug, Clone)]
pub struct HeatmapOptions {
    pub show_legend: bool,
    pub show_summary: bool,
    pub since: DayKey,
    pub until: DayKey,
    pub today: DayKey,
}

/// Render a GitHub-style contribution grid: columns are weeks, rows are
/// weekdays starting on Sunday. Cells outside `[since, until]` are blank.
pub fn render_heatmap(stats: &DayCountMap, opts: &HeatmapOptions) -> String {
    let (Some(since), Some(until)) = (opts.since.to_date(), opts.until.to_date()) else {
        return String::new();
    };
    if since > until {
        return String::new();
    }

    // Columns are whole weeks; the grid starts on the Sunday at or before
    // the window start.
    let mut grid_start = since;
    while grid_start.weekday() != Weekday::Sun {
        match grid_start.pred_opt() {
            Some(prev) => grid_start = prev,
            None => return String::new(),
        }
    }

    let mut week_starts = Vec::new();
    let mut week = grid_start;
    while week <= until {
        week_starts.push(week);
        match week.checked_add_days(Days::new(7)) {
            Some(next) => week = next,
            None => break,
        }
    }

    let mut out = String::new();
    write_month_header(&mut out, &week_starts);

    for row in 0..7u64 {
        out.push_str(weekday_label(row));
        for week in &week_starts {
            let Some(day) = week.checked_add_days(Days::new(row)) else {
                out.push_str("    ");
                continue;
            };
            if day < since || day > until {
                out.push_str("    ");
                continue;
            }
            let key = DayKey::from_date(day);
            let count = stats.get(&key).copied().unwrap_or(0);
            out.push_str(&render_cell(count, key == opts.today));
        }
        out.push('\n');
    }

    if opts.show_legend {
        out.push_str(&render_legend());
    }

    if opts.show_summary {
        out.push_str(&render_summary(&crate::stats::summary::calculate_summary(
            stats, opts.today,
        )));
    }

    out
}

/// Month abbreviations above the first week column of each month.
fn write_month_header(out: &mut String, week_starts: &[NaiveDate]) {
    out.push_str("    ");
    let mut last_month = 0u32;
    for week in week_starts {
        let month = week.month();
        if month != last_month {
            let _ = write!(out, "{} ", week.format("%b"));
            last_month = month;
        } else {
            out.push_str("    ");
        }
    }
    out.push('\n');
}

fn weekday_label(row: u64) -> &'static str {
    match row {
        1 => "Mon ",
        3 => "Wed ",
        5 => "Fri ",
        _ => "    ",
    }
}

fn cell_style(count: u32, today: bool) -> Style {
    let style = Style::new();
    if today {
        return style.color256(199);
    }
    match count {
        0 => style.color256(240),
        1..=4 => style.color256(120),
        5..=9 => style.color256(76),
        _ => style.color256(34),
    }
}

fn render_cell(count: u32, today: bool) -> String {
    let glyph = if count == 0 { "░░" } else { "██" };
    format!("{}  ", cell_style(count, today).apply_to(glyph))
}

pub fn render_legend() -> String {
    let empty = Style::new().color256(240);
    let low = Style::new().color256(120);
    let medium = Style::new().color256(76);
    let high = Style::new().color256(34);
    format!(
        "Less {} {} {} {} More\n     0  1-4 5-9 10+\n",
        empty.apply_to("░░"),
        low.apply_to("██"),
        medium.apply_to("██"),
        high.apply_to("██"),
    )
}

/// Multi-line plain-text summary block, suitable for direct terminal output.
pub fn render_summary(s: &Summary) -> String {
    let mut out = String::new();
    out.push_str(&"─".repeat(SUMMARY_RULE_LEN));
    out.push('\n');

    let _ = writeln!(
        out,
        "Total: {} commits │ Active days: {} │ Current streak: {} {}",
        s.total_commits,
        s.active_days,
        s.current_streak,
        pluralize(s.current_streak, "day", "days"),
    );

    match (s.longest_streak.start, s.longest_streak.end) {
        (Some(start), Some(end)) if s.longest_streak.days > 0 => {
            let _ = writeln!(
                out,
                "Longest streak: {} {} ({} - {})",
                s.longest_streak.days,
                pluralize(s.longest_streak.days, "day", "days"),
                format_short_date(start),
                format_short_date(end),
            );
        }
        _ => {
            let _ = writeln!(
                out,
                "Longest streak: {} {}",
                s.longest_streak.days,
                pluralize(s.longest_streak.days, "day", "days"),
            );
        }
    }

    let most_label = if s.most_active_weekday.commits > 0 {
        weekday_abbrev(s.most_active_weekday.weekday)
    } else {
        "-"
    };
    let peak_label = match s.peak_day.date {
        Some(date) if s.peak_day.commits > 0 => format_short_date(date),
        _ => "-".to_string(),
    };
    let _ = writeln!(
        out,
        "Most active: {} ({} commits) │ Peak day: {} ({} commits)",
        most_label, s.most_active_weekday.commits, peak_label, s.peak_day.commits,
    );

    out
}

fn format_short_date(day: DayKey) -> String {
    match day.to_date() {
        Some(date) => date.format("%b %d").to_string(),
        None => day.to_date_string(),
    }
}

fn pluralize(n: u32, singular: &'static str, plural: &'static str) -> &'static str {
    if n == 1 {
        singular
    } else {
        plural
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::summary::calculate_summary;

    fn key(y: i32, m: u32, d: u32) -> DayKey {
        DayKey::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn options(since: DayKey, until: DayKey) -> HeatmapOptions {
        HeatmapOptions {
            show_legend: true,
            show_summary: false,
            since,
            until,
            today: until,
        }
    }

    #[test]
    fn heatmap_has_seven_rows_and_labels() {
        let stats: DayCountMap = [(key(2024, 1, 2), 3)].into_iter().collect();
        let out = render_heatmap(&stats, &options(key(2024, 1, 1), key(2024, 1, 31)));
        let lines: Vec<&str> = out.lines().collect();
        // Month header + 7 weekday rows + 2 legend lines.
        assert_eq!(lines.len(), 10);
        assert!(lines[0].contains("Jan"));
        assert!(lines[2].starts_with("Mon "));
        assert!(lines[4].starts_with("Wed "));
        assert!(lines[6].starts_with("Fri "));
        assert!(out.contains("██"));
        assert!(out.contains("Less"));
    }

    #[test]
    fn heatmap_without_legend_is_shorter() {
        let stats = DayCountMap::new();
        let mut opts = options(key(2024, 1, 1), key(2024, 1, 31));
        opts.show_legend = false;
        let out = render_heatmap(&stats, &opts);
        assert_eq!(out.lines().count(), 8);
        assert!(!out.contains("Less"));
    }

    #[test]
    fn heatmap_appends_summary_when_enabled() {
        let stats: DayCountMap = [(key(2024, 1, 2), 1)].into_iter().collect();
        let mut opts = options(key(2024, 1, 1), key(2024, 1, 31));
        opts.show_summary = true;
        let out = render_heatmap(&stats, &opts);
        assert!(out.contains("Total: 1 commits"));
    }

    #[test]
    fn summary_block_renders_metrics() {
        let stats: DayCountMap = [
            (key(2024, 1, 2), 2),
            (key(2024, 1, 3), 1),
        ]
        .into_iter()
        .collect();
        let summary = calculate_summary(&stats, key(2024, 1, 31));
        let out = render_summary(&summary);
        assert!(out.contains("Total: 3 commits"));
        assert!(out.contains("Active days: 2"));
        assert!(out.contains("Longest streak: 2 days (Jan 02 - Jan 03)"));
        assert!(out.contains("Peak day: Jan 02 (2 commits)"));
    }

    #[test]
    fn empty_summary_uses_placeholders() {
        let out = render_summary(&Summary::default());
        assert!(out.contains("Total: 0 commits"));
        assert!(out.contains("Longest streak: 0 days"));
        assert!(out.contains("Most active: - (0 commits)"));
        assert!(out.contains("Peak day: - (0 commits)"));
    }
}
