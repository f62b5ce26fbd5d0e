use crate::cli::{csv_field, CompareArgs, OutputFormat};
use crate::config::Config;
use crate::model::{BranchScope, CompareMetrics, DayKey, PercentChange, Period};
use crate::repos::RepoStore;
use crate::stats::timerange::day_start;
use crate::stats::{
    calculate_compare_metrics, collect_stats, collect_stats_by_emails, parse_period, percent_change,
    time_range, weekday_abbrev, CollectOptions,
};
use chrono::Local;
use console::style;
use serde::Serialize;
use std::io::Write;

pub fn exec(args: CompareArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let repos = RepoStore::open_default()?.load()?;
    if repos.is_empty() {
        println!("no repositories added");
        return Ok(());
    }

    let emails = clean_non_empty(&args.emails);
    let mut period_args = clean_non_empty(&args.periods);
    period_args.extend(years_to_periods(&args.years));

    if !emails.is_empty() {
        if emails.len() < 2 {
            anyhow::bail!("at least 2 emails are required to compare");
        }
        compare_emails(args.format, &config, &repos, &emails)
    } else if !period_args.is_empty() {
        if period_args.len() < 2 {
            anyhow::bail!("at least 2 periods are required to compare");
        }
        compare_periods(args.format, &config, &repos, &period_args)
    } else {
        anyhow::bail!("at least 2 compare items are required (use -e/--email or --period/--year)");
    }
}

struct EmailItem {
    email: String,
    metrics: CompareMetrics,
}

struct PeriodItem {
    period: Period,
    metrics: CompareMetrics,
}

/// Every requested identity is collected in one pass over the repositories,
/// bucketed by canonical email.
fn compare_emails(
    format: OutputFormat,
    config: &Config,
    repos: &[String],
    emails: &[String],
) -> anyhow::Result<()> {
    let now = Local::now();
    let (since, until) = time_range("", "", config.months, &now)?;
    let normalizer = config.normalizer();

    let opts = CollectOptions {
        repos,
        emails,
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };
    let collected = collect_stats_by_emails(&opts, &since, &until)?;
    if let Some(joined) = collected.joined_failure() {
        eprintln!("{} {joined}", style("warning:").yellow().bold());
    }

    let today = DayKey::from_date(now.date_naive());
    let items: Vec<EmailItem> = emails
        .iter()
        .map(|email| {
            let canonical = normalizer.normalize(email);
            let daily = collected.stats.get(&canonical).cloned().unwrap_or_default();
            EmailItem {
                email: email.clone(),
                metrics: calculate_compare_metrics(&daily, today),
            }
        })
        .collect();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Table => write_email_table(&mut out, &items),
        OutputFormat::Json => write_email_json(&mut out, &items),
        OutputFormat::Csv => write_email_csv(&mut out, &items),
    }
}

fn compare_periods(
    format: OutputFormat,
    config: &Config,
    repos: &[String],
    period_args: &[String],
) -> anyhow::Result<()> {
    let mut periods = Vec::with_capacity(period_args.len());
    for arg in period_args {
        periods.push(parse_period(arg)?);
    }

    let collect_emails: Vec<String> = if config.email.trim().is_empty() {
        Vec::new()
    } else {
        vec![config.email.trim().to_string()]
    };
    let normalizer = config.normalizer();
    let now = Local::now();
    let today = DayKey::from_date(now.date_naive());

    let mut items = Vec::with_capacity(periods.len());
    let mut warnings = Vec::new();

    for period in periods {
        let since = day_start(&Local, period.start)?;
        let until = day_start(&Local, period.end)?;
        let opts = CollectOptions {
            repos,
            emails: &collect_emails,
            scope: BranchScope::default(),
            use_cache: true,
            normalizer: &normalizer,
        };

        let metrics = match collect_stats(&opts, &since, &until) {
            Ok(collected) => {
                if let Some(joined) = collected.joined_failure() {
                    warnings.push(joined);
                }
                calculate_compare_metrics(&collected.stats, today)
            }
            Err(err) => {
                warnings.push(err.to_string());
                calculate_compare_metrics(&Default::default(), today)
            }
        };
        items.push(PeriodItem { period, metrics });
    }

    if !warnings.is_empty() {
        eprintln!(
            "{} {}",
            style("warning:").yellow().bold(),
            warnings.join("; ")
        );
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Table => write_period_table(&mut out, &items),
        OutputFormat::Json => write_period_json(&mut out, &items),
        OutputFormat::Csv => write_period_csv(&mut out, &items),
    }
}

fn years_to_periods(years: &[i32]) -> Vec<String> {
    years
        .iter()
        .filter(|&&y| y > 0)
        .map(|y| format!("{y:04}"))
        .collect()
}

fn clean_non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn most_active_day_label(m: &CompareMetrics) -> String {
    if m.most_active_weekday_commits == 0 {
        "-".to_string()
    } else {
        weekday_abbrev(m.most_active_weekday).to_string()
    }
}

fn streak_label(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

fn percent_label(pc: PercentChange) -> String {
    if !pc.defined {
        return "N/A".to_string();
    }
    let rounded = (pc.percent * 10.0).round() / 10.0;
    let sign = if rounded > 0.0 { "+" } else { "" };
    format!("{sign}{rounded:.1}%")
}

fn write_email_table(out: &mut impl Write, items: &[EmailItem]) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let row_labels = [
        "Total commits",
        "Active days",
        "Avg commits/day",
        "Most active day",
        "Longest streak",
    ];

    let mut values: Vec<Vec<String>> = vec![Vec::with_capacity(items.len()); row_labels.len()];
    for item in items {
        values[0].push(item.metrics.total_commits.to_string());
        values[1].push(item.metrics.active_days.to_string());
        values[2].push(format!("{:.1}", item.metrics.avg_commits_per_day));
        values[3].push(most_active_day_label(&item.metrics));
        values[4].push(streak_label(item.metrics.longest_streak_days));
    }

    let headers: Vec<String> = items.iter().map(|item| item.email.clone()).collect();
    write_matrix_table(out, &headers, &row_labels, &values)
}

fn write_period_table(out: &mut impl Write, items: &[PeriodItem]) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let row_labels = ["Total commits", "Active days", "Avg commits/day"];
    let mut values: Vec<Vec<String>> = vec![Vec::new(); row_labels.len()];

    // Columns interleave as: P1, P2, Change, P3, Change, ...
    let mut headers = Vec::new();
    for (index, item) in items.iter().enumerate() {
        headers.push(item.period.label.clone());
        if index > 0 {
            headers.push("Change".to_string());
        }
    }

    let first = &items[0].metrics;
    values[0].push(first.total_commits.to_string());
    values[1].push(first.active_days.to_string());
    values[2].push(format!("{:.1}", first.avg_commits_per_day));

    let mut prev = first.clone();
    for item in &items[1..] {
        let cur = &item.metrics;
        values[0].push(cur.total_commits.to_string());
        values[1].push(cur.active_days.to_string());
        values[2].push(format!("{:.1}", cur.avg_commits_per_day));

        values[0].push(percent_label(percent_change(
            prev.total_commits as f64,
            cur.total_commits as f64,
        )));
        values[1].push(percent_label(percent_change(
            prev.active_days as f64,
            cur.active_days as f64,
        )));
        values[2].push(percent_label(percent_change(
            prev.avg_commits_per_day,
            cur.avg_commits_per_day,
        )));
        prev = cur.clone();
    }

    // Each metric row is (value, change) pairs after the first column; the
    // interleaved header order matches because both push in item order.
    write_matrix_table(out, &headers, &row_labels, &values)
}

/// Matrix layout: rows are metrics, columns are compared items.
fn write_matrix_table(
    out: &mut impl Write,
    headers: &[String],
    row_labels: &[&str],
    values: &[Vec<String>],
) -> anyhow::Result<()> {
    if headers.is_empty() || row_labels.is_empty() || values.len() != row_labels.len() {
        return Ok(());
    }

    let sep = "    ";
    let label_width = row_labels.iter().map(|l| l.len()).max().unwrap_or(0);

    let mut col_widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in values {
        for (col, cell) in row.iter().enumerate() {
            if col < col_widths.len() {
                col_widths[col] = col_widths[col].max(cell.len());
            }
        }
    }

    write!(out, "{:<label_width$}{sep}", "")?;
    for (col, header) in headers.iter().enumerate() {
        write!(out, "{:<width$}", header, width = col_widths[col])?;
        if col < headers.len() - 1 {
            write!(out, "{sep}")?;
        }
    }
    writeln!(out)?;

    let rule_len = label_width
        + sep.len()
        + col_widths.iter().sum::<usize>()
        + sep.len() * (headers.len().saturating_sub(1));
    writeln!(out, "{}", "─".repeat(rule_len))?;

    for (row, label) in row_labels.iter().enumerate() {
        write!(out, "{label:<label_width$}{sep}")?;
        for col in 0..headers.len() {
            let cell = values[row].get(col).map(String::as_str).unwrap_or("");
            write!(out, "{:>width$}", cell, width = col_widths[col])?;
            if col < headers.len() - 1 {
                write!(out, "{sep}")?;
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareJsonItem {
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<String>,
    total_commits: u32,
    active_days: u32,
    avg_commits_per_day: f64,
    most_active_day: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    longest_streak_days: Option<u32>,
    longest_streak: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareJsonDelta {
    from: String,
    to: String,
    total_commits_percent: Option<f64>,
    active_days_percent: Option<f64>,
    avg_commits_per_day_percent: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareJsonOutput {
    dimension: &'static str,
    items: Vec<CompareJsonItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changes: Vec<CompareJsonDelta>,
}

fn json_item(label: String, period: Option<&Period>, m: &CompareMetrics) -> CompareJsonItem {
    CompareJsonItem {
        label,
        start: period.map(|p| p.start.format("%Y-%m-%d").to_string()),
        end: period.map(|p| p.end.format("%Y-%m-%d").to_string()),
        total_commits: m.total_commits,
        active_days: m.active_days,
        avg_commits_per_day: m.avg_commits_per_day,
        most_active_day: most_active_day_label(m),
        longest_streak_days: (m.longest_streak_days > 0).then_some(m.longest_streak_days),
        longest_streak: streak_label(m.longest_streak_days),
    }
}

fn percent_value(pc: PercentChange) -> Option<f64> {
    pc.defined.then_some(pc.percent)
}

fn write_email_json(out: &mut impl Write, items: &[EmailItem]) -> anyhow::Result<()> {
    let output = CompareJsonOutput {
        dimension: "email",
        items: items
            .iter()
            .map(|item| json_item(item.email.clone(), None, &item.metrics))
            .collect(),
        changes: Vec::new(),
    };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn write_period_json(out: &mut impl Write, items: &[PeriodItem]) -> anyhow::Result<()> {
    let mut changes = Vec::new();
    for pair in items.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        changes.push(CompareJsonDelta {
            from: prev.period.label.clone(),
            to: cur.period.label.clone(),
            total_commits_percent: percent_value(percent_change(
                prev.metrics.total_commits as f64,
                cur.metrics.total_commits as f64,
            )),
            active_days_percent: percent_value(percent_change(
                prev.metrics.active_days as f64,
                cur.metrics.active_days as f64,
            )),
            avg_commits_per_day_percent: percent_value(percent_change(
                prev.metrics.avg_commits_per_day,
                cur.metrics.avg_commits_per_day,
            )),
        });
    }

    let output = CompareJsonOutput {
        dimension: "period",
        items: items
            .iter()
            .map(|item| json_item(item.period.label.clone(), Some(&item.period), &item.metrics))
            .collect(),
        changes,
    };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn write_email_csv(out: &mut impl Write, items: &[EmailItem]) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let mut header = vec!["metric".to_string()];
    header.extend(items.iter().map(|item| csv_field(&item.email)));
    writeln!(out, "{}", header.join(","))?;

    let rows: [(&str, fn(&CompareMetrics) -> String); 5] = [
        ("totalCommits", |m| m.total_commits.to_string()),
        ("activeDays", |m| m.active_days.to_string()),
        ("avgCommitsPerDay", |m| format!("{:.1}", m.avg_commits_per_day)),
        ("mostActiveDay", |m| most_active_day_label(m)),
        ("longestStreakDays", |m| m.longest_streak_days.to_string()),
    ];

    for (label, value) in rows {
        let mut row = vec![label.to_string()];
        row.extend(items.iter().map(|item| value(&item.metrics)));
        writeln!(out, "{}", row.join(","))?;
    }

    Ok(())
}

fn write_period_csv(out: &mut impl Write, items: &[PeriodItem]) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let mut header = vec!["metric".to_string(), csv_field(&items[0].period.label)];
    for pair in items.windows(2) {
        header.push(csv_field(&pair[1].period.label));
        header.push(csv_field(&format!(
            "change({}->{})",
            pair[0].period.label, pair[1].period.label
        )));
    }
    writeln!(out, "{}", header.join(","))?;

    let mut totals = vec![items[0].metrics.total_commits.to_string()];
    let mut actives = vec![items[0].metrics.active_days.to_string()];
    let mut avgs = vec![format!("{:.1}", items[0].metrics.avg_commits_per_day)];

    for pair in items.windows(2) {
        let (prev, cur) = (&pair[0].metrics, &pair[1].metrics);
        totals.push(cur.total_commits.to_string());
        totals.push(percent_label(percent_change(
            prev.total_commits as f64,
            cur.total_commits as f64,
        )));
        actives.push(cur.active_days.to_string());
        actives.push(percent_label(percent_change(
            prev.active_days as f64,
            cur.active_days as f64,
        )));
        avgs.push(format!("{:.1}", cur.avg_commits_per_day));
        avgs.push(percent_label(percent_change(
            prev.avg_commits_per_day,
            cur.avg_commits_per_day,
        )));
    }

    writeln!(out, "totalCommits,{}", totals.join(","))?;
    writeln!(out, "activeDays,{}", actives.join(","))?;
    writeln!(out, "avgCommitsPerDay,{}", avgs.join(","))?;

    Ok(())
}
