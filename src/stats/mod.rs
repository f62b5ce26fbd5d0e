pub mod collect;
pub mod period;
pub mod ranking;
pub mod render;
pub mod summary;
pub mod timerange;
pub mod walker;

pub use collect::{
    collect_stats, collect_stats_by_emails, collect_stats_per_repo, CollectOptions, Collected,
};
pub use period::parse_period;
pub use ranking::rank_repositories;
pub use summary::{
    calculate_compare_metrics, calculate_summary, percent_change, percent_changes, weekday_abbrev,
};
pub use timerange::{parse_date, time_range};
