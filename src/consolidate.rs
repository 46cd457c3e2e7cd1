//! Cross-version consolidation: regroup per-version run documents, merge
//! each entry across versions and rank every bucket.

use crate::schema::{ByBucket, ConsolidatedDocument, RunDocument, SCHEMA_VERSION};
use crate::stats::{merge_versions, rank_all, MergedSummary, Summary};
use crate::EntryKey;
use std::collections::BTreeMap;

/// entry → version label → per-version summary
pub fn collect_summaries(
    runs: &BTreeMap<String, RunDocument>,
) -> BTreeMap<EntryKey, BTreeMap<String, Summary>> {
    let mut out: BTreeMap<EntryKey, BTreeMap<String, Summary>> = BTreeMap::new();
    for (label, run) in runs {
        for (key, summary) in run.summaries() {
            out.entry(key).or_default().insert(label.clone(), summary);
        }
    }
    out
}

/// Merge every entry across versions. Entries without any contributing
/// summary are left out rather than zero-filled.
pub fn merge_all(
    per_entry: &BTreeMap<EntryKey, BTreeMap<String, Summary>>,
) -> BTreeMap<EntryKey, MergedSummary> {
    per_entry
        .iter()
        .filter_map(|(key, per_version)| {
            merge_versions(per_version).map(|merged| (key.clone(), merged))
        })
        .collect()
}

pub fn consolidate(
    runs: BTreeMap<String, RunDocument>,
    timestamp: impl Into<String>,
) -> ConsolidatedDocument {
    let merged = merge_all(&collect_summaries(&runs));
    let ranked = rank_all(&merged);

    let mut summary: ByBucket<BTreeMap<String, MergedSummary>> = BTreeMap::new();
    for (key, m) in merged {
        summary
            .entry(key.operation)
            .or_default()
            .entry(key.size)
            .or_default()
            .insert(key.subject, m);
    }

    let mut rankings: ByBucket<Vec<_>> = BTreeMap::new();
    for (bucket, entries) in ranked {
        rankings
            .entry(bucket.operation)
            .or_default()
            .insert(bucket.size, entries);
    }

    tracing::info!(
        versions = runs.len(),
        buckets = rankings.values().map(BTreeMap::len).sum::<usize>(),
        "consolidated benchmark runs"
    );

    ConsolidatedDocument {
        timestamp: timestamp.into(),
        schema_version: SCHEMA_VERSION,
        runs,
        summary,
        rankings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SystemInfo;
    use crate::{BucketKey, DatasetSize, Operation};

    fn summary(avg: f64) -> Summary {
        Summary {
            avg,
            min: avg - 1.0,
            max: avg + 1.0,
            memory: Some(512.0),
            iterations: 5,
        }
    }

    fn run(version: &str, entries: &[(&str, Operation, f64)]) -> RunDocument {
        let mut doc = RunDocument::new("t", SystemInfo::detect(version));
        for (subject, operation, avg) in entries {
            doc.insert(
                &EntryKey::new(*operation, DatasetSize::Small, *subject),
                summary(*avg),
            );
        }
        doc
    }

    #[test]
    fn test_consolidate_two_versions() {
        let mut runs = BTreeMap::new();
        runs.insert(
            "18".to_string(),
            run(
                "v18",
                &[
                    ("adm-zip", Operation::Create, 10.0),
                    ("jszip", Operation::Create, 30.0),
                ],
            ),
        );
        runs.insert(
            "20".to_string(),
            run(
                "v20",
                &[
                    ("adm-zip", Operation::Create, 20.0),
                    ("fflate", Operation::Extract, 2.0),
                ],
            ),
        );

        let doc = consolidate(runs, "now");
        let merged = doc.merged_entries();

        let adm = &merged[&EntryKey::new(Operation::Create, DatasetSize::Small, "adm-zip")];
        assert_eq!(adm.avg_across_versions, 15.0);
        assert_eq!(adm.min_across_versions, 9.0);
        assert_eq!(adm.max_across_versions, 21.0);
        assert_eq!(adm.versions, vec!["18", "20"]);

        let jszip = &merged[&EntryKey::new(Operation::Create, DatasetSize::Small, "jszip")];
        assert_eq!(jszip.versions_count, 1);

        let create = doc.ranking(BucketKey::new(Operation::Create, DatasetSize::Small));
        assert_eq!(create.len(), 2);
        assert_eq!(create[0].library, "adm-zip");
        assert_eq!(create[1].relative_speed, 0.5);

        let extract = doc.ranking(BucketKey::new(Operation::Extract, DatasetSize::Small));
        assert_eq!(extract.len(), 1);
        assert!(doc
            .ranking(BucketKey::new(Operation::Extract, DatasetSize::Large))
            .is_empty());
        doc.validate().unwrap();
    }

    #[test]
    fn test_untested_operation_is_absent() {
        let mut runs = BTreeMap::new();
        runs.insert("20".to_string(), run("v20", &[("yazl", Operation::Create, 5.0)]));
        let doc = consolidate(runs, "now");
        assert!(!doc
            .merged_entries()
            .contains_key(&EntryKey::new(Operation::Extract, DatasetSize::Small, "yazl")));
    }

    #[test]
    fn test_consolidated_json_shape() {
        let mut runs = BTreeMap::new();
        runs.insert("20".to_string(), run("v20", &[("yazl", Operation::Create, 5.0)]));
        let json = serde_json::to_value(consolidate(runs, "now")).unwrap();
        assert_eq!(json["summary"]["create"]["small"]["yazl"]["versionsCount"], 1);
        assert_eq!(json["rankings"]["create"]["small"][0]["rank"], 1);
        assert_eq!(json["rankings"]["create"]["small"][0]["relativeSpeed"], 1.0);
        assert!(json["runs"]["20"]["results"]["small"].is_object());
    }

    #[test]
    fn test_empty_runs() {
        let doc = consolidate(BTreeMap::new(), "now");
        assert!(doc.summary.is_empty());
        assert!(doc.rankings.is_empty());
    }
}
