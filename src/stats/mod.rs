//! Statistics pipeline: trials → summaries → cross-version merge → ranking
//! and baseline comparison → display projection.
//!
//! Every stage is a pure function over fully materialized inputs.

pub mod aggregate;
pub mod compare;
pub mod merge;
pub mod project;
pub mod rank;

pub use aggregate::{aggregate, Summary, Trial};
pub use compare::{
    compare, Change, Classification, CompareConfig, Comparison, ComparisonEntry,
    ComparisonReport, ComparisonSummary, Difference, Side, Timed,
};
pub use merge::{merge_versions, MergedSummary};
pub use project::{
    parse_millis, parse_percent, parse_relative_speed, project_comparison, project_ranking,
    ChangeRow, Medal, Precision, RankingRow,
};
pub use rank::{rank_all, rank_bucket, RankedEntry};
