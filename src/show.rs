use crate::cli::{prepare_run, warn_partial, OutputFormat, ShowArgs};
use crate::model::{BranchScope, DayCountMap, DayKey};
use crate::stats::render::{render_heatmap, HeatmapOptions};
use crate::stats::{calculate_summary, collect_stats, weekday_abbrev, CollectOptions};
use chrono::Local;
use serde::Serialize;
use std::io::Write;

pub fn exec(args: ShowArgs) -> anyhow::Result<()> {
    let Some(ctx) = prepare_run(&args.filter)? else {
        println!("no repositories added");
        return Ok(());
    };

    let scope = BranchScope {
        branch: args.branch.clone(),
        all_branches: args.all_branches,
    };
    let normalizer = ctx.config.normalizer();
    let opts = CollectOptions {
        repos: &ctx.repos,
        emails: &ctx.emails,
        scope,
        use_cache: !args.no_cache,
        normalizer: &normalizer,
    };

    let collected = collect_stats(&opts, &ctx.since, &ctx.until)?;
    warn_partial(&collected, collected.stats.is_empty())?;
    let stats = collected.stats;

    let today = DayKey::from_date(Local::now().date_naive());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match args.format {
        OutputFormat::Table => {
            let rendered = render_heatmap(
                &stats,
                &HeatmapOptions {
                    show_legend: !args.no_legend,
                    show_summary: !args.no_summary,
                    since: DayKey::from_date(ctx.since.date_naive()),
                    until: DayKey::from_date(ctx.until.date_naive()),
                    today,
                },
            );
            write!(out, "{rendered}")?;
        }
        OutputFormat::Json => write_json(&mut out, &stats, !args.no_summary, today)?,
        OutputFormat::Csv => write_csv(&mut out, &stats)?,
    }

    Ok(())
}

#[derive(Serialize)]
struct DayRow {
    date: String,
    count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreakOut {
    days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeekdayOut {
    weekday: &'static str,
    commits: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PeakDayOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    commits: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryOut {
    total_commits: u32,
    active_days: u32,
    current_streak: u32,
    longest_streak: StreakOut,
    most_active_weekday: WeekdayOut,
    peak_day: PeakDayOut,
}

#[derive(Serialize)]
struct JsonOutput {
    days: Vec<DayRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SummaryOut>,
}

fn write_json(
    out: &mut impl Write,
    stats: &DayCountMap,
    include_summary: bool,
    today: DayKey,
) -> anyhow::Result<()> {
    let days: Vec<DayRow> = stats
        .iter()
        .map(|(day, count)| DayRow {
            date: day.to_date_string(),
            count: *count,
        })
        .collect();

    let summary = include_summary.then(|| {
        let s = calculate_summary(stats, today);
        SummaryOut {
            total_commits: s.total_commits,
            active_days: s.active_days,
            current_streak: s.current_streak,
            longest_streak: StreakOut {
                days: s.longest_streak.days,
                start: s.longest_streak.start.map(|d| d.to_date_string()),
                end: s.longest_streak.end.map(|d| d.to_date_string()),
            },
            most_active_weekday: WeekdayOut {
                weekday: weekday_abbrev(s.most_active_weekday.weekday),
                commits: s.most_active_weekday.commits,
            },
            peak_day: PeakDayOut {
                date: s.peak_day.date.map(|d| d.to_date_string()),
                commits: s.peak_day.commits,
            },
        }
    });

    let output = JsonOutput { days, summary };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn write_csv(out: &mut impl Write, stats: &DayCountMap) -> anyhow::Result<()> {
    writeln!(out, "date,count")?;
    for (day, count) in stats {
        writeln!(out, "{},{}", day.to_date_string(), count)?;
    }
    Ok(())
}
