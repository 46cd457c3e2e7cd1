//! End-to-end: run documents on disk → consolidation → comparison.

use archive_bench::consolidate::consolidate;
use archive_bench::discovery::{load_runs, RunFilePattern};
use archive_bench::schema::{
    load_comparable, load_consolidated, write_json, ComparisonDocument, RunDocument, SystemInfo,
};
use archive_bench::stats::{
    aggregate, compare, project_ranking, Classification, CompareConfig, Precision, Summary, Trial,
};
use archive_bench::{BenchError, BucketKey, DatasetSize, EntryKey, Operation};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

fn summary_of(durations: &[f64]) -> Summary {
    let trials: Vec<Trial> = durations.iter().map(|&d| Trial::success(d, Some(1024))).collect();
    aggregate(&trials, trials.len()).unwrap()
}

fn write_run(dir: &Path, label: &str, entries: &[(&str, Operation, DatasetSize, &[f64])]) {
    let mut doc = RunDocument::new("2025-01-01T00:00:00Z", SystemInfo::detect(format!("v{label}")));
    for (subject, operation, size, durations) in entries {
        doc.insert(&EntryKey::new(*operation, *size, *subject), summary_of(durations));
    }
    write_json(&dir.join(format!("benchmark-node{label}.json")), &doc).unwrap();
}

#[test]
fn consolidate_then_rank() {
    let dir = tempdir().unwrap();
    write_run(
        dir.path(),
        "18",
        &[
            ("adm-zip", Operation::Create, DatasetSize::Small, &[10.0, 12.0, 11.0]),
            ("jszip", Operation::Create, DatasetSize::Small, &[20.0, 22.0, 24.0]),
        ],
    );
    write_run(
        dir.path(),
        "20",
        &[
            ("adm-zip", Operation::Create, DatasetSize::Small, &[9.0, 9.0, 9.0]),
            ("jszip", Operation::Create, DatasetSize::Small, &[18.0, 20.0, 22.0]),
            ("fflate", Operation::Extract, DatasetSize::Large, &[5.0]),
        ],
    );

    let runs = load_runs(dir.path(), &RunFilePattern::default()).unwrap();
    assert_eq!(runs.len(), 2);

    let doc = consolidate(runs, "now");
    let out = dir.path().join("consolidated-results.json");
    write_json(&out, &doc).unwrap();
    let reloaded = load_consolidated(&out).unwrap();
    assert_eq!(reloaded, doc);

    let bucket = reloaded.ranking(BucketKey::new(Operation::Create, DatasetSize::Small));
    assert_eq!(bucket[0].library, "adm-zip");
    assert_eq!(bucket[0].avg_time, 10.0);
    assert_eq!(bucket[0].min_time, 9.0);
    assert_eq!(bucket[0].max_time, 12.0);
    assert_eq!(bucket[0].versions, vec!["18", "20"]);
    assert_eq!(bucket[1].library, "jszip");
    assert_eq!(bucket[1].avg_time, 21.0);

    let rows = project_ranking(bucket, &Precision::default());
    assert_eq!(rows[1].relative_speed, "0.48x");

    let fflate = reloaded.ranking(BucketKey::new(Operation::Extract, DatasetSize::Large));
    assert_eq!(fflate.len(), 1);
    assert_eq!(fflate[0].versions_count, 1);
}

#[test]
fn compare_consolidated_against_raw_baseline() {
    let dir = tempdir().unwrap();
    write_run(
        dir.path(),
        "20",
        &[
            ("adm-zip", Operation::Create, DatasetSize::Small, &[100.0]),
            ("jszip", Operation::Create, DatasetSize::Small, &[100.0]),
            ("yazl", Operation::Create, DatasetSize::Small, &[50.0]),
        ],
    );
    let baseline_path = dir.path().join("benchmark-node20.json");

    let mut current_runs = BTreeMap::new();
    let mut current = RunDocument::new("later", SystemInfo::detect("v22"));
    let small = |s: &str| EntryKey::new(Operation::Create, DatasetSize::Small, s);
    current.insert(&small("adm-zip"), summary_of(&[106.0]));
    current.insert(&small("jszip"), summary_of(&[103.0]));
    current.insert(&small("fflate"), summary_of(&[40.0]));
    current_runs.insert("22".to_string(), current);
    let current_path = dir.path().join("consolidated-results.json");
    write_json(&current_path, &consolidate(current_runs, "later")).unwrap();

    let baseline = load_comparable(&baseline_path).unwrap().merged_entries();
    let current = load_comparable(&current_path).unwrap().merged_entries();
    let report = compare(&baseline, &current, &CompareConfig::default()).unwrap();

    assert_eq!(
        report.get(&small("adm-zip")).unwrap().classification(),
        Some(Classification::Regression)
    );
    assert_eq!(
        report.get(&small("jszip")).unwrap().classification(),
        Some(Classification::Unchanged)
    );
    assert_eq!(report.get(&small("yazl")).unwrap().status(), "removed");
    assert_eq!(report.get(&small("fflate")).unwrap().status(), "added");
    assert_eq!(report.summary.total_libraries, 4);
    assert_eq!(report.summary.regressions, 1);

    let doc = ComparisonDocument::from_report(&report, "now");
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["differences"]["create"]["small"]["adm-zip"]["status"], "compared");
    assert_eq!(json["differences"]["create"]["small"]["fflate"]["status"], "added");
    assert!(json["differences"]["create"]["small"]["fflate"]
        .get("difference")
        .is_none());
    assert_eq!(json["summary"]["hasSignificantChanges"], true);
    assert_eq!(json["regressions"][0]["library"], "adm-zip");
}

#[test]
fn zero_baseline_surfaces_invalid_baseline() {
    let key = EntryKey::new(Operation::Extract, DatasetSize::Medium, "yauzl");
    let zero = Summary {
        avg: 0.0,
        min: 0.0,
        max: 0.0,
        memory: None,
        iterations: 1,
    };
    let baseline = BTreeMap::from([(key.clone(), zero)]);
    let current = BTreeMap::from([(key.clone(), summary_of(&[3.0]))]);

    match compare(&baseline, &current, &CompareConfig::default()) {
        Err(BenchError::InvalidBaseline { key: k, .. }) => assert_eq!(k, key),
        other => panic!("expected InvalidBaseline, got {other:?}"),
    }
}

#[test]
fn malformed_document_is_rejected_at_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("benchmark-node20.json");
    std::fs::write(
        &path,
        r#"{
            "timestamp": "t",
            "systemInfo": {"runtimeVersion": "v20", "platform": "linux", "arch": "x64", "cpus": 4},
            "results": {"small": {"jszip": {"create": {"avg": -1.0, "min": -2.0, "max": 0.0, "iterations": 2}}}}
        }"#,
    )
    .unwrap();

    match load_runs(dir.path(), &RunFilePattern::default()) {
        Err(BenchError::MalformedInput { path, .. }) => {
            assert!(path.ends_with("results.small.jszip.create.avg"), "{path}")
        }
        other => panic!("expected MalformedInput, got {other:?}"),
    }
}
