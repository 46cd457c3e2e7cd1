//! Baseline comparison and regression detection.
//!
//! Compares two summary sets keyed by `(operation, size, subject)` and
//! classifies each compared entry against a percentage threshold.

use crate::error::{BenchError, Result};
use crate::stats::aggregate::Summary;
use crate::stats::merge::MergedSummary;
use crate::{DatasetSize, EntryKey, Operation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Minimal view of a summary the comparator needs.
///
/// Implemented by both per-version and merged summaries, so comparison works
/// whether or not a cross-version merge happened upstream.
pub trait Timed {
    fn average_duration(&self) -> f64;
    fn average_memory(&self) -> Option<f64>;
    fn versions_count(&self) -> Option<usize> {
        None
    }
}

impl Timed for Summary {
    fn average_duration(&self) -> f64 {
        self.avg
    }

    fn average_memory(&self) -> Option<f64> {
        self.memory
    }
}

impl Timed for MergedSummary {
    fn average_duration(&self) -> f64 {
        self.avg_across_versions
    }

    fn average_memory(&self) -> Option<f64> {
        self.memory_avg
    }

    fn versions_count(&self) -> Option<usize> {
        Some(self.versions_count)
    }
}

/// Comparator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Minimum |change| as a fraction (0.05 = 5%) to count as a regression
    /// or improvement.
    pub threshold: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self { threshold: 0.05 }
    }
}

impl CompareConfig {
    pub fn with_threshold(threshold: f64) -> Result<Self> {
        let config = Self { threshold };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(BenchError::InvalidConfig {
                parameter: "threshold".to_string(),
                reason: format!("must be a finite fraction >= 0, got {}", self.threshold),
            });
        }
        Ok(())
    }

    /// Threshold expressed in percent.
    pub fn threshold_percent(&self) -> f64 {
        self.threshold * 100.0
    }

    pub fn classify(&self, percent_change: f64) -> Classification {
        let limit = self.threshold_percent();
        if percent_change > limit {
            Classification::Regression
        } else if percent_change < -limit {
            Classification::Improvement
        } else {
            Classification::Unchanged
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Regression,
    Improvement,
    Unchanged,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Regression => "regression",
            Classification::Improvement => "improvement",
            Classification::Unchanged => "unchanged",
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Side {
    pub time: f64,
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<usize>,
}

impl Side {
    fn of<T: Timed>(summary: &T) -> Self {
        Self {
            time: summary.average_duration(),
            memory: summary.average_memory(),
            versions: summary.versions_count(),
        }
    }
}

/// Current minus baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub time: f64,
    pub time_percent: f64,
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Comparison {
    Compared {
        baseline: Side,
        current: Side,
        difference: Difference,
        classification: Classification,
    },
    Added {
        current: Side,
    },
    Removed {
        baseline: Side,
    },
}

impl Comparison {
    pub fn status(&self) -> &'static str {
        match self {
            Comparison::Compared { .. } => "compared",
            Comparison::Added { .. } => "added",
            Comparison::Removed { .. } => "removed",
        }
    }

    pub fn classification(&self) -> Option<Classification> {
        match self {
            Comparison::Compared { classification, .. } => Some(*classification),
            _ => None,
        }
    }

    pub fn percent_change(&self) -> Option<f64> {
        match self {
            Comparison::Compared { difference, .. } => Some(difference.time_percent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonEntry {
    pub key: EntryKey,
    pub comparison: Comparison,
}

/// A significant change, listed in the regression or improvement ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub library: String,
    pub operation: Operation,
    pub size: DatasetSize,
    /// Percent change of the average duration.
    pub change: f64,
    pub baseline_time: f64,
    pub current_time: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    /// Distinct subject names seen on either side.
    pub total_libraries: usize,
    pub regressions: usize,
    pub improvements: usize,
    /// Compared entries within the threshold.
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
    pub has_significant_changes: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub config: CompareConfig,
    /// One entry per key of the union, in key order.
    pub entries: Vec<ComparisonEntry>,
    /// Sorted by descending |change|.
    pub regressions: Vec<Change>,
    /// Sorted by descending |change|.
    pub improvements: Vec<Change>,
    pub summary: ComparisonSummary,
}

impl ComparisonReport {
    pub fn top_regressions(&self, n: usize) -> &[Change] {
        &self.regressions[..n.min(self.regressions.len())]
    }

    pub fn top_improvements(&self, n: usize) -> &[Change] {
        &self.improvements[..n.min(self.improvements.len())]
    }

    pub fn get(&self, key: &EntryKey) -> Option<&Comparison> {
        self.entries
            .binary_search_by(|e| e.key.cmp(key))
            .ok()
            .map(|i| &self.entries[i].comparison)
    }

    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Compare a baseline summary set against a current one.
///
/// Fails with [`BenchError::InvalidBaseline`] when a compared key has a
/// baseline average that is zero, negative or non-finite.
pub fn compare<B: Timed, C: Timed>(
    baseline: &BTreeMap<EntryKey, B>,
    current: &BTreeMap<EntryKey, C>,
    config: &CompareConfig,
) -> Result<ComparisonReport> {
    config.validate()?;

    let keys: BTreeSet<&EntryKey> = baseline.keys().chain(current.keys()).collect();

    let mut entries = Vec::with_capacity(keys.len());
    let mut regressions = Vec::new();
    let mut improvements = Vec::new();
    let mut summary = ComparisonSummary::default();
    let mut libraries: BTreeSet<&str> = BTreeSet::new();

    for key in keys {
        libraries.insert(key.subject.as_str());

        let comparison = match (baseline.get(key), current.get(key)) {
            (Some(base), Some(cur)) => {
                let (comparison, change) = compare_pair(key, base, cur, config)?;
                match comparison.classification() {
                    Some(Classification::Regression) => regressions.extend(change),
                    Some(Classification::Improvement) => improvements.extend(change),
                    _ => summary.unchanged += 1,
                }
                comparison
            }
            (Some(base), None) => {
                summary.removed += 1;
                Comparison::Removed {
                    baseline: Side::of(base),
                }
            }
            (None, Some(cur)) => {
                summary.added += 1;
                Comparison::Added {
                    current: Side::of(cur),
                }
            }
            (None, None) => continue,
        };

        entries.push(ComparisonEntry {
            key: key.clone(),
            comparison,
        });
    }

    // Stable sorts: equal magnitudes stay in key order.
    regressions.sort_by(|a, b| b.change.abs().total_cmp(&a.change.abs()));
    improvements.sort_by(|a, b| b.change.abs().total_cmp(&a.change.abs()));

    summary.total_libraries = libraries.len();
    summary.regressions = regressions.len();
    summary.improvements = improvements.len();
    summary.has_significant_changes = summary.regressions > 0 || summary.improvements > 0;

    tracing::debug!(
        entries = entries.len(),
        regressions = summary.regressions,
        improvements = summary.improvements,
        threshold = config.threshold,
        "comparison complete"
    );

    Ok(ComparisonReport {
        config: *config,
        entries,
        regressions,
        improvements,
        summary,
    })
}

fn compare_pair<B: Timed, C: Timed>(
    key: &EntryKey,
    base: &B,
    cur: &C,
    config: &CompareConfig,
) -> Result<(Comparison, Option<Change>)> {
    let baseline_time = base.average_duration();
    let current_time = cur.average_duration();

    if !baseline_time.is_finite() || baseline_time <= 0.0 {
        return Err(BenchError::InvalidBaseline {
            key: key.clone(),
            average: baseline_time,
        });
    }
    if !current_time.is_finite() || current_time < 0.0 {
        return Err(BenchError::malformed(
            format!("current.{}.{}.{}", key.operation, key.size, key.subject),
            format!("average duration must be finite and >= 0, got {current_time}"),
        ));
    }

    let time = current_time - baseline_time;
    let time_percent = time / baseline_time * 100.0;

    let (memory, memory_percent) = match (base.average_memory(), cur.average_memory()) {
        (Some(b), Some(c)) => {
            let delta = c - b;
            let pct = (b != 0.0).then(|| delta / b.abs() * 100.0);
            (Some(delta), pct)
        }
        _ => (None, None),
    };

    let classification = config.classify(time_percent);
    let change = (classification != Classification::Unchanged).then(|| Change {
        library: key.subject.clone(),
        operation: key.operation,
        size: key.size,
        change: time_percent,
        baseline_time,
        current_time,
        difference: time,
    });

    let comparison = Comparison::Compared {
        baseline: Side::of(base),
        current: Side::of(cur),
        difference: Difference {
            time,
            time_percent,
            memory,
            memory_percent,
        },
        classification,
    };

    Ok((comparison, change))
}
