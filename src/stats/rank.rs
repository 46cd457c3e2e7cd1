use crate::stats::merge::MergedSummary;
use crate::{BucketKey, EntryKey};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A merged summary placed within its `(operation, size)` bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// 1-based, contiguous, never shared.
    pub rank: usize,
    pub library: String,
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    #[serde(default)]
    pub avg_memory: Option<f64>,
    pub versions_count: usize,
    pub versions: Vec<String>,
    /// Winner's average divided by this entry's average.
    pub relative_speed: f64,
}

/// Rank one bucket by ascending average duration.
///
/// The sort is stable: subjects with bit-identical averages keep the order
/// they were supplied in and receive consecutive ranks.
///
/// Relative speed lies in (0, 1] whenever the winner's average is positive,
/// which holds for every measured duration. A zero-average winner is the
/// one degenerate case: entries that also average 0 get 1.0, and any
/// positive entry gets 0.0 (infinitely slower) instead of a made-up ratio.
pub fn rank_bucket(mut members: Vec<(String, MergedSummary)>) -> Vec<RankedEntry> {
    members.sort_by(|(_, a), (_, b)| a.avg_across_versions.total_cmp(&b.avg_across_versions));

    let Some(fastest) = members.first().map(|(_, m)| m.avg_across_versions) else {
        return Vec::new();
    };

    members
        .into_iter()
        .enumerate()
        .map(|(i, (library, merged))| {
            let relative_speed = if i == 0 || merged.avg_across_versions == 0.0 {
                1.0
            } else {
                fastest / merged.avg_across_versions
            };
            RankedEntry {
                rank: i + 1,
                library,
                avg_time: merged.avg_across_versions,
                min_time: merged.min_across_versions,
                max_time: merged.max_across_versions,
                avg_memory: merged.memory_avg,
                versions_count: merged.versions_count,
                versions: merged.versions,
                relative_speed,
            }
        })
        .collect()
}

/// Rank every bucket of a merged summary set.
///
/// Buckets are independent, so they are ranked in parallel. Within a bucket
/// subjects are supplied in key order, which makes tie-breaking reproducible.
pub fn rank_all(
    merged: &BTreeMap<EntryKey, MergedSummary>,
) -> BTreeMap<BucketKey, Vec<RankedEntry>> {
    let mut buckets: BTreeMap<BucketKey, Vec<(String, MergedSummary)>> = BTreeMap::new();
    for (key, summary) in merged {
        buckets
            .entry(key.bucket())
            .or_default()
            .push((key.subject.clone(), summary.clone()));
    }

    let ranked: Vec<(BucketKey, Vec<RankedEntry>)> = buckets
        .into_par_iter()
        .map(|(bucket, members)| (bucket, rank_bucket(members)))
        .collect();

    ranked.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DatasetSize, Operation};

    fn merged(avg: f64) -> MergedSummary {
        MergedSummary {
            avg_across_versions: avg,
            min_across_versions: avg,
            max_across_versions: avg,
            memory_avg: None,
            versions_count: 1,
            versions: vec!["20".to_string()],
        }
    }

    #[test]
    fn test_two_subjects() {
        let ranked = rank_bucket(vec![("B".into(), merged(20.0)), ("A".into(), merged(10.0))]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].library, "A");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].relative_speed, 1.0);
        assert_eq!(ranked[1].library, "B");
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[1].relative_speed, 0.5);
    }

    #[test]
    fn test_ties_keep_input_order_and_consecutive_ranks() {
        let ranked = rank_bucket(vec![
            ("zeta".into(), merged(5.0)),
            ("alpha".into(), merged(5.0)),
            ("fast".into(), merged(1.0)),
        ]);
        let names: Vec<_> = ranked.iter().map(|r| r.library.as_str()).collect();
        assert_eq!(names, vec!["fast", "zeta", "alpha"]);
        let ranks: Vec<_> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(ranked[1].relative_speed, ranked[2].relative_speed);
    }

    #[test]
    fn test_empty_bucket() {
        assert!(rank_bucket(Vec::new()).is_empty());
    }

    #[test]
    fn test_zero_average_winner() {
        let ranked = rank_bucket(vec![("a".into(), merged(0.0)), ("b".into(), merged(0.0))]);
        assert!(ranked.iter().all(|r| r.relative_speed == 1.0));
    }

    #[test]
    fn test_zero_average_winner_with_positive_entry() {
        let ranked = rank_bucket(vec![("slow".into(), merged(4.0)), ("free".into(), merged(0.0))]);
        assert_eq!(ranked[0].library, "free");
        assert_eq!(ranked[0].relative_speed, 1.0);
        assert_eq!(ranked[1].library, "slow");
        assert_eq!(ranked[1].relative_speed, 0.0);
    }

    #[test]
    fn test_positive_winner_keeps_speeds_in_unit_interval() {
        let ranked = rank_bucket(vec![
            ("c".into(), merged(0.75)),
            ("a".into(), merged(0.25)),
            ("b".into(), merged(500.0)),
        ]);
        assert_eq!(ranked[0].relative_speed, 1.0);
        assert!(ranked
            .iter()
            .all(|r| r.relative_speed > 0.0 && r.relative_speed <= 1.0));
    }

    #[test]
    fn test_rank_all_groups_buckets() {
        let mut set = BTreeMap::new();
        set.insert(EntryKey::new(Operation::Create, DatasetSize::Small, "a"), merged(2.0));
        set.insert(EntryKey::new(Operation::Create, DatasetSize::Small, "b"), merged(1.0));
        set.insert(EntryKey::new(Operation::Extract, DatasetSize::Large, "a"), merged(3.0));

        let all = rank_all(&set);
        assert_eq!(all.len(), 2);
        let small = &all[&BucketKey::new(Operation::Create, DatasetSize::Small)];
        assert_eq!(small[0].library, "b");
        assert_eq!(small[1].relative_speed, 0.5);
        let large = &all[&BucketKey::new(Operation::Extract, DatasetSize::Large)];
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].rank, 1);
    }

    #[test]
    fn test_serialized_field_names() {
        let ranked = rank_bucket(vec![("a".into(), merged(1.0))]);
        let json = serde_json::to_value(&ranked[0]).unwrap();
        for field in [
            "rank",
            "library",
            "avgTime",
            "minTime",
            "maxTime",
            "avgMemory",
            "versionsCount",
            "versions",
            "relativeSpeed",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
