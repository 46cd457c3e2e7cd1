//! Display projection for rankings and comparisons.
//!
//! Turns ranked and compared entries into the literal fields a renderer
//! prints. No statistics are computed here.

use crate::stats::compare::{Comparison, ComparisonReport};
use crate::stats::rank::RankedEntry;
use serde::{Deserialize, Serialize};

/// Decimal places used when formatting numbers for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    pub time_decimals: usize,
    pub ratio_decimals: usize,
    pub percent_decimals: usize,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            time_decimals: 2,
            ratio_decimals: 2,
            percent_decimals: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
    None,
}

impl Medal {
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            1 => Medal::Gold,
            2 => Medal::Silver,
            3 => Medal::Bronze,
            _ => Medal::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub rank_label: String,
    pub medal: Medal,
    pub library: String,
    pub avg_time: String,
    pub min_time: String,
    pub max_time: String,
    pub avg_memory: String,
    pub versions: String,
    pub relative_speed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRow {
    pub library: String,
    pub operation: String,
    pub size: String,
    /// `regression`, `improvement`, `unchanged`, `added` or `removed`.
    pub status: String,
    pub baseline: Option<String>,
    pub current: Option<String>,
    pub change: Option<String>,
}

const NOT_MEASURED: &str = "n/a";

fn millis(value: f64, precision: &Precision) -> String {
    format!("{:.*}", precision.time_decimals, value)
}

pub fn project_ranking(entries: &[RankedEntry], precision: &Precision) -> Vec<RankingRow> {
    entries
        .iter()
        .map(|e| RankingRow {
            rank_label: e.rank.to_string(),
            medal: Medal::for_rank(e.rank),
            library: e.library.clone(),
            avg_time: millis(e.avg_time, precision),
            min_time: millis(e.min_time, precision),
            max_time: millis(e.max_time, precision),
            avg_memory: e
                .avg_memory
                .map(|m| format!("{}", m.round() as i64))
                .unwrap_or_else(|| NOT_MEASURED.to_string()),
            versions: e.versions.join(", "),
            relative_speed: format!("{:.*}x", precision.ratio_decimals, e.relative_speed),
        })
        .collect()
}

pub fn project_comparison(report: &ComparisonReport, precision: &Precision) -> Vec<ChangeRow> {
    report
        .entries
        .iter()
        .map(|entry| {
            let (status, baseline, current, change) = match &entry.comparison {
                Comparison::Compared {
                    baseline,
                    current,
                    difference,
                    classification,
                } => (
                    classification.as_str(),
                    Some(millis(baseline.time, precision)),
                    Some(millis(current.time, precision)),
                    Some(format!(
                        "{:+.*}%",
                        precision.percent_decimals, difference.time_percent
                    )),
                ),
                Comparison::Added { current } => {
                    ("added", None, Some(millis(current.time, precision)), None)
                }
                Comparison::Removed { baseline } => {
                    ("removed", Some(millis(baseline.time, precision)), None, None)
                }
            };
            ChangeRow {
                library: entry.key.subject.clone(),
                operation: entry.key.operation.to_string(),
                size: entry.key.size.to_string(),
                status: status.to_string(),
                baseline,
                current,
                change,
            }
        })
        .collect()
}

pub fn parse_millis(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

pub fn parse_relative_speed(s: &str) -> Option<f64> {
    s.trim().strip_suffix('x')?.parse().ok()
}

pub fn parse_percent(s: &str) -> Option<f64> {
    s.trim().strip_suffix('%')?.parse().ok()
}
