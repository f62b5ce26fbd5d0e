use crate::config::Config;
use crate::error::Result;
use crate::repos::RepoStore;
use crate::stats::{time_range, Collected};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;

#[derive(Parser)]
#[command(name = "commitmap")]
#[command(about = "Contribution heatmap and commit analytics across local git repositories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Bare `commitmap` behaves like `commitmap show`.
    #[clap(flatten)]
    pub show: ShowArgs,
}

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    #[arg(short, long = "email", help = "Email filter (repeatable)")]
    pub emails: Vec<String>,

    #[arg(
        short,
        long,
        default_value_t = 0,
        help = "Months to include (0 = config value; ignored when --since/--until is set)"
    )]
    pub months: u32,

    #[arg(long, help = "Start date (YYYY-MM-DD, YYYY-MM, or relative like 2m/1w/1y)")]
    pub since: Option<String>,

    #[arg(long, help = "End date (YYYY-MM-DD, YYYY-MM, or relative like 2m/1w/1y)")]
    pub until: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Args, Clone, Default)]
pub struct ShowArgs {
    #[clap(flatten)]
    pub filter: FilterArgs,

    #[arg(short, long, help = "Branch to include (default: HEAD)")]
    pub branch: Option<String>,

    #[arg(
        long,
        conflicts_with = "branch",
        help = "Include all local branches (deduplicated by commit hash)"
    )]
    pub all_branches: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[arg(long, help = "Hide legend in table output")]
    pub no_legend: bool,

    #[arg(long, help = "Hide summary")]
    pub no_summary: bool,

    #[arg(long, help = "Disable cache, force full scan")]
    pub no_cache: bool,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Table
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        })
    }
}

#[derive(Args, Clone)]
pub struct TopArgs {
    #[clap(flatten)]
    pub filter: FilterArgs,

    #[arg(
        short,
        long,
        default_value_t = 10,
        conflicts_with = "all",
        help = "Number of repositories to show"
    )]
    pub number: usize,

    #[arg(long, help = "Show all repositories")]
    pub all: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Clone)]
pub struct CompareArgs {
    #[arg(
        short,
        long = "email",
        conflicts_with_all = ["periods", "years"],
        help = "Emails to compare (repeatable)"
    )]
    pub emails: Vec<String>,

    #[arg(
        long = "period",
        help = "Periods to compare (repeatable): YYYY, YYYY-HN, YYYY-QN, YYYY-MM"
    )]
    pub periods: Vec<String>,

    #[arg(long = "year", help = "Years to compare (repeatable; shortcut for --period YYYY)")]
    pub years: Vec<i32>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Clone)]
pub struct AddArgs {
    #[arg(help = "Folder to scan for git repositories")]
    pub folder: String,

    #[arg(
        short,
        long,
        default_value_t = -1,
        help = "Maximum recursion depth (-1 for unlimited)"
    )]
    pub depth: i32,

    #[arg(short = 'x', long = "exclude", help = "Exclude directories (repeatable)")]
    pub excludes: Vec<String>,

    #[arg(long, help = "Preview repositories without adding")]
    pub dry_run: bool,
}

#[derive(Args, Clone)]
pub struct RemoveArgs {
    #[arg(help = "Repository path to remove")]
    pub path: Option<String>,

    #[arg(long, help = "Remove every path that is no longer a git repository")]
    pub invalid: bool,
}

#[derive(Args, Clone)]
pub struct ListArgs {
    #[arg(long, help = "Verify repositories on disk")]
    pub verify: bool,
}

#[derive(Args, Clone)]
#[command(args_conflicts_with_subcommands = true)]
pub struct SetArgs {
    #[command(subcommand)]
    pub action: Option<SetAction>,

    #[arg(help = "Configuration key (email or months)")]
    pub key: Option<String>,

    #[arg(help = "New value")]
    pub value: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum SetAction {
    /// Manage email alias groups
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum AliasAction {
    /// Add or update an alias group; the first email is the primary
    Add {
        name: String,
        #[arg(required = true)]
        emails: Vec<String>,
    },
    /// Remove an alias group
    Remove { name: String },
    /// List all alias groups
    List,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the contribution heatmap (the default command)
    Show(ShowArgs),
    /// Show top repositories by commits
    Top(TopArgs),
    /// Compare contribution stats by email or period
    Compare(CompareArgs),
    /// Scan a folder and add the git repositories found
    Add(AddArgs),
    /// Remove a repository from the list
    Remove(RemoveArgs),
    /// List added repositories
    List(ListArgs),
    /// Show or modify configuration and aliases
    Set(SetArgs),
    /// Diagnose environment and configuration issues
    Doctor,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            None => crate::show::exec(self.show),
            Some(Commands::Show(args)) => crate::show::exec(args),
            Some(Commands::Top(args)) => crate::top::exec(args),
            Some(Commands::Compare(args)) => crate::compare::exec(args),
            Some(Commands::Add(args)) => crate::manage::exec_add(args),
            Some(Commands::Remove(args)) => crate::manage::exec_remove(args),
            Some(Commands::List(args)) => crate::manage::exec_list(args),
            Some(Commands::Set(args)) => crate::setcmd::exec(args),
            Some(Commands::Doctor) => crate::manage::exec_doctor(),
        }
    }
}

/// Shared initialization for the stats commands: configuration, repository
/// list, resolved window, merged email filter.
pub(crate) struct RunContext {
    pub repos: Vec<String>,
    pub emails: Vec<String>,
    pub since: DateTime<Local>,
    pub until: DateTime<Local>,
    pub months: u32,
    pub config: Config,
}

/// `Ok(None)` means no repositories are added yet; commands print a notice
/// and exit cleanly.
pub(crate) fn prepare_run(filter: &FilterArgs) -> Result<Option<RunContext>> {
    let config = Config::load()?;

    let cleaned: Vec<String> = filter
        .emails
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    let repos = RepoStore::open_default()?.load()?;
    if repos.is_empty() {
        return Ok(None);
    }

    let since = filter.since.as_deref().unwrap_or("").trim();
    let until = filter.until.as_deref().unwrap_or("").trim();

    let resolved_months = if filter.months == 0 {
        config.months
    } else {
        filter.months
    };
    // An explicit window makes the months flag irrelevant; the config value
    // still backs the until-only resolution rule.
    let range_months = if since.is_empty() && until.is_empty() {
        resolved_months
    } else {
        config.months
    };

    let now = Local::now();
    let (start, end) = time_range(since, until, range_months, &now)?;

    let mut emails = cleaned;
    if emails.is_empty() && !config.email.trim().is_empty() {
        emails = vec![config.email.trim().to_string()];
    }

    Ok(Some(RunContext {
        repos,
        emails,
        since: start,
        until: end,
        months: resolved_months,
        config,
    }))
}

/// Apply the partial-failure policy: empty result plus failures is fatal,
/// otherwise failures become a stderr warning.
pub(crate) fn warn_partial<T>(collected: &Collected<T>, is_empty: bool) -> anyhow::Result<()> {
    if let Some(joined) = collected.joined_failure() {
        if is_empty {
            anyhow::bail!("all repositories failed to collect stats: {joined}");
        }
        eprintln!(
            "{} some repositories failed, showing partial results: {joined}",
            style("warning:").yellow().bold()
        );
    }
    Ok(())
}

/// Minimal CSV quoting: fields with commas, quotes, or newlines get wrapped.
pub(crate) fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
