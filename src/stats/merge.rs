use crate::stats::aggregate::Summary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-version aggregate for one `(subject, operation, size)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSummary {
    /// Mean of the per-version averages.
    pub avg_across_versions: f64,
    pub min_across_versions: f64,
    pub max_across_versions: f64,
    /// Mean of the per-version memory averages that were measured.
    #[serde(default)]
    pub memory_avg: Option<f64>,
    pub versions_count: usize,
    /// Contributing version labels, unique and sorted.
    pub versions: Vec<String>,
}

impl MergedSummary {
    /// Treat a single un-merged summary as a one-version merge.
    pub fn from_single(label: impl Into<String>, summary: &Summary) -> Self {
        Self {
            avg_across_versions: summary.avg,
            min_across_versions: summary.min,
            max_across_versions: summary.max,
            memory_avg: summary.memory,
            versions_count: 1,
            versions: vec![label.into()],
        }
    }
}

/// Merge the summaries collected under different version labels.
///
/// Keys of the map are the contributing labels, so they are unique and the
/// reduction order is fixed by label, not by collection order. Returns
/// `None` for an empty map.
pub fn merge_versions(per_version: &BTreeMap<String, Summary>) -> Option<MergedSummary> {
    if per_version.is_empty() {
        return None;
    }

    let n = per_version.len() as f64;
    let mut avg_sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut mem_sum = 0.0;
    let mut mem_count = 0usize;

    for summary in per_version.values() {
        avg_sum += summary.avg;
        min = min.min(summary.min);
        max = max.max(summary.max);
        if let Some(mem) = summary.memory {
            mem_sum += mem;
            mem_count += 1;
        }
    }

    let versions: Vec<String> = per_version.keys().cloned().collect();

    Some(MergedSummary {
        avg_across_versions: avg_sum / n,
        min_across_versions: min,
        max_across_versions: max,
        memory_avg: (mem_count > 0).then(|| mem_sum / mem_count as f64),
        versions_count: versions.len(),
        versions,
    })
}
