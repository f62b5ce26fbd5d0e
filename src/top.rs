use crate::cli::{csv_field, prepare_run, warn_partial, OutputFormat, TopArgs};
use crate::model::{BranchScope, RepoRanking};
use crate::stats::{collect_stats_per_repo, rank_repositories, CollectOptions};
use std::io::Write;
use std::path::MAIN_SEPARATOR;

pub fn exec(args: TopArgs) -> anyhow::Result<()> {
    let Some(ctx) = prepare_run(&args.filter)? else {
        println!("no repositories added");
        return Ok(());
    };

    if !args.all && args.number == 0 {
        anyhow::bail!("number must be > 0");
    }

    let normalizer = ctx.config.normalizer();
    let opts = CollectOptions {
        repos: &ctx.repos,
        emails: &ctx.emails,
        scope: BranchScope::default(),
        use_cache: false,
        normalizer: &normalizer,
    };

    let collected = collect_stats_per_repo(&opts, &ctx.since, &ctx.until)?;
    warn_partial(&collected, collected.stats.is_empty())?;

    let limit = if args.all { 0 } else { args.number };
    let ranking = rank_repositories(&collected.stats, limit);

    let explicit_range = args.filter.since.as_deref().unwrap_or("").trim() != ""
        || args.filter.until.as_deref().unwrap_or("").trim() != "";
    let range_label = if explicit_range {
        format!(
            "{} to {}",
            ctx.since.date_naive().format("%Y-%m-%d"),
            ctx.until.date_naive().format("%Y-%m-%d")
        )
    } else {
        format!("last {} months", ctx.months)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Table => {
            if ranking.total_commits == 0 {
                writeln!(out, "no commits found")?;
                return Ok(());
            }
            write_table(&mut out, &ranking, &range_label)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &ranking)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &ranking)?,
    }

    Ok(())
}

fn write_table(out: &mut impl Write, ranking: &RepoRanking, range_label: &str) -> anyhow::Result<()> {
    let display_paths: Vec<String> = ranking
        .repositories
        .iter()
        .map(|r| display_repo_path(&r.repository))
        .collect();

    let repo_width = display_paths
        .iter()
        .map(String::len)
        .chain(["Repository".len()])
        .max()
        .unwrap_or(0);
    let rank_width = ranking.repositories.len().to_string().len().max(2);
    let commit_width = ranking
        .repositories
        .iter()
        .map(|r| r.commits.to_string().len())
        .chain(["Commits".len(), ranking.total_commits.to_string().len()])
        .max()
        .unwrap_or(0);
    let percent_width = "100.0%".len();

    let line_len = rank_width + 3 + repo_width + 1 + commit_width + 1 + percent_width;
    let rule = "─".repeat(line_len);

    writeln!(
        out,
        "Top {} repositories ({range_label})",
        ranking.repositories.len()
    )?;
    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "{:>rank_width$}   {:<repo_width$} {:>commit_width$} {:>percent_width$}",
        "#", "Repository", "Commits", "%"
    )?;
    writeln!(out, "{rule}")?;

    for (index, rank) in ranking.repositories.iter().enumerate() {
        let percent = format!("{:.1}%", rank.percent);
        writeln!(
            out,
            "{:>rank_width$}   {:<repo_width$} {:>commit_width$} {:>percent_width$}",
            index + 1,
            display_paths[index],
            rank.commits,
            percent
        )?;
    }

    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "{:>rank_width$}   {:<repo_width$} {:>commit_width$} {:>percent_width$}",
        "", "Total", ranking.total_commits, "100.0%"
    )?;

    Ok(())
}

fn write_csv(out: &mut impl Write, ranking: &RepoRanking) -> anyhow::Result<()> {
    writeln!(out, "repository,commits,percent")?;
    for rank in &ranking.repositories {
        writeln!(
            out,
            "{},{},{:.1}",
            csv_field(&rank.repository),
            rank.commits,
            rank.percent
        )?;
    }
    Ok(())
}

/// Shorten a repository path for display by replacing the home directory
/// with `~`.
fn display_repo_path(path: &str) -> String {
    let Some(home) = dirs::home_dir() else {
        return path.to_string();
    };
    let home = home.to_string_lossy().to_string();
    if home.trim().is_empty() {
        return path.to_string();
    }

    if path == home {
        return "~".to_string();
    }
    let prefix = format!("{home}{MAIN_SEPARATOR}");
    if let Some(rest) = path.strip_prefix(&prefix) {
        return format!("~{MAIN_SEPARATOR}{rest}");
    }
    path.to_string()
}
