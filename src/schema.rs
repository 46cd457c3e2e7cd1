//! JSON documents exchanged with the surrounding tooling.
//!
//! Documents are validated here, at the boundary, so that no malformed or
//! non-finite value reaches the statistics pipeline.

use crate::error::{BenchError, Result};
use crate::stats::{
    Change, Comparison, ComparisonReport, ComparisonSummary, MergedSummary, RankedEntry, Summary,
};
use crate::{BucketKey, DatasetSize, EntryKey, Operation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

/// Label given to the summaries of a raw run document when it is compared
/// without a cross-version merge.
pub const SINGLE_RUN_LABEL: &str = "current";

/// size → subject → operation → record
pub type RunResults = BTreeMap<DatasetSize, BTreeMap<String, BTreeMap<Operation, Summary>>>;

/// operation → size → subject → value
pub type ByBucket<T> = BTreeMap<Operation, BTreeMap<DatasetSize, T>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    #[serde(alias = "nodeVersion")]
    pub runtime_version: String,
    pub platform: String,
    pub arch: String,
    pub cpus: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl SystemInfo {
    /// Describe the current host; `runtime_version` is whatever label the
    /// caller runs under.
    pub fn detect(runtime_version: impl Into<String>) -> Self {
        Self {
            runtime_version: runtime_version.into(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            total_memory: None,
            hostname: std::env::var("HOSTNAME").ok(),
        }
    }
}

/// Result document of one benchmark run under one runtime version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDocument {
    pub timestamp: String,
    pub system_info: SystemInfo,
    pub results: RunResults,
}

impl RunDocument {
    pub fn new(timestamp: impl Into<String>, system_info: SystemInfo) -> Self {
        Self {
            timestamp: timestamp.into(),
            system_info,
            results: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: &EntryKey, summary: Summary) {
        self.results
            .entry(key.size)
            .or_default()
            .entry(key.subject.clone())
            .or_default()
            .insert(key.operation, summary);
    }

    /// `None` means the subject was not tested for this operation and size.
    pub fn get(&self, key: &EntryKey) -> Option<&Summary> {
        self.results
            .get(&key.size)?
            .get(&key.subject)?
            .get(&key.operation)
    }

    /// Flatten the nested results into entry-keyed summaries.
    pub fn summaries(&self) -> BTreeMap<EntryKey, Summary> {
        let mut out = BTreeMap::new();
        for (size, subjects) in &self.results {
            for (subject, operations) in subjects {
                for (operation, summary) in operations {
                    out.insert(
                        EntryKey::new(*operation, *size, subject.clone()),
                        summary.clone(),
                    );
                }
            }
        }
        out
    }

    pub fn validate(&self) -> Result<()> {
        for (size, subjects) in &self.results {
            for (subject, operations) in subjects {
                if subject.is_empty() {
                    return Err(BenchError::malformed(
                        format!("results.{size}"),
                        "subject name must not be empty",
                    ));
                }
                for (operation, summary) in operations {
                    validate_summary(&format!("results.{size}.{subject}.{operation}"), summary)?;
                }
            }
        }
        Ok(())
    }
}

fn check_finite(path: &str, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(BenchError::malformed(
            format!("{path}.{field}"),
            format!("must be finite, got {value}"),
        ));
    }
    Ok(())
}

fn check_duration(path: &str, field: &str, value: f64) -> Result<()> {
    check_finite(path, field, value)?;
    if value < 0.0 {
        return Err(BenchError::malformed(
            format!("{path}.{field}"),
            format!("duration must be >= 0, got {value}"),
        ));
    }
    Ok(())
}

fn check_order(path: &str, min: f64, avg: f64, max: f64) -> Result<()> {
    // Tolerate rounding noise from producers that do not clamp the mean.
    let eps = 1e-9 * avg.abs().max(1.0);
    if min > avg + eps || avg > max + eps {
        return Err(BenchError::malformed(
            path,
            format!("expected min <= avg <= max, got {min} / {avg} / {max}"),
        ));
    }
    Ok(())
}

fn validate_summary(path: &str, s: &Summary) -> Result<()> {
    check_duration(path, "avg", s.avg)?;
    check_duration(path, "min", s.min)?;
    check_duration(path, "max", s.max)?;
    if let Some(memory) = s.memory {
        check_finite(path, "memory", memory)?;
    }
    check_order(path, s.min, s.avg, s.max)?;
    if s.iterations == 0 {
        return Err(BenchError::malformed(
            format!("{path}.iterations"),
            "a record needs at least one successful trial",
        ));
    }
    Ok(())
}

fn validate_merged(path: &str, m: &MergedSummary) -> Result<()> {
    check_duration(path, "avgAcrossVersions", m.avg_across_versions)?;
    check_duration(path, "minAcrossVersions", m.min_across_versions)?;
    check_duration(path, "maxAcrossVersions", m.max_across_versions)?;
    if let Some(memory) = m.memory_avg {
        check_finite(path, "memoryAvg", memory)?;
    }
    check_order(
        path,
        m.min_across_versions,
        m.avg_across_versions,
        m.max_across_versions,
    )?;
    if m.versions.is_empty() {
        return Err(BenchError::malformed(
            format!("{path}.versions"),
            "at least one contributing version is required",
        ));
    }
    let unique: BTreeSet<&String> = m.versions.iter().collect();
    if unique.len() != m.versions.len() {
        return Err(BenchError::malformed(
            format!("{path}.versions"),
            "version labels must be unique",
        ));
    }
    if m.versions_count != m.versions.len() {
        return Err(BenchError::malformed(
            format!("{path}.versionsCount"),
            format!(
                "{} does not match {} listed versions",
                m.versions_count,
                m.versions.len()
            ),
        ));
    }
    Ok(())
}

/// Results of several runtime versions, merged and ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedDocument {
    pub timestamp: String,
    #[serde(default)]
    pub schema_version: u32,
    /// version label → raw run document
    #[serde(default)]
    pub runs: BTreeMap<String, RunDocument>,
    pub summary: ByBucket<BTreeMap<String, MergedSummary>>,
    #[serde(default)]
    pub rankings: ByBucket<Vec<RankedEntry>>,
}

impl ConsolidatedDocument {
    /// Flatten `summary` into entry-keyed merged summaries.
    pub fn merged_entries(&self) -> BTreeMap<EntryKey, MergedSummary> {
        let mut out = BTreeMap::new();
        for (operation, sizes) in &self.summary {
            for (size, subjects) in sizes {
                for (subject, merged) in subjects {
                    out.insert(
                        EntryKey::new(*operation, *size, subject.clone()),
                        merged.clone(),
                    );
                }
            }
        }
        out
    }

    /// Ranked bucket; empty when nothing was tested for it.
    pub fn ranking(&self, bucket: BucketKey) -> &[RankedEntry] {
        self.rankings
            .get(&bucket.operation)
            .and_then(|sizes| sizes.get(&bucket.size))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<()> {
        for (label, run) in &self.runs {
            run.validate().map_err(|e| match e {
                BenchError::MalformedInput { path, reason } => {
                    BenchError::malformed(format!("runs.{label}.{path}"), reason)
                }
                other => other,
            })?;
        }
        for (operation, sizes) in &self.summary {
            for (size, subjects) in sizes {
                for (subject, merged) in subjects {
                    validate_merged(&format!("summary.{operation}.{size}.{subject}"), merged)?;
                }
            }
        }
        for (operation, sizes) in &self.rankings {
            for (size, entries) in sizes {
                for (i, entry) in entries.iter().enumerate() {
                    let path = format!("rankings.{operation}.{size}[{i}]");
                    if entry.rank != i + 1 {
                        return Err(BenchError::malformed(
                            format!("{path}.rank"),
                            format!("expected rank {}, got {}", i + 1, entry.rank),
                        ));
                    }
                    check_finite(&path, "relativeSpeed", entry.relative_speed)?;
                }
            }
        }
        Ok(())
    }
}

/// Either document kind, as found in a baseline slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparable {
    Consolidated(ConsolidatedDocument),
    Run(RunDocument),
}

impl Comparable {
    /// Entry-keyed merged summaries; a raw run becomes single-version
    /// summaries labelled with its runtime version.
    pub fn merged_entries(&self) -> BTreeMap<EntryKey, MergedSummary> {
        match self {
            Comparable::Consolidated(doc) => doc.merged_entries(),
            Comparable::Run(run) => {
                let label = if run.system_info.runtime_version.is_empty() {
                    SINGLE_RUN_LABEL
                } else {
                    run.system_info.runtime_version.as_str()
                };
                run.summaries()
                    .into_iter()
                    .map(|(key, s)| {
                        let merged = MergedSummary::from_single(label, &s);
                        (key, merged)
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonDocument {
    pub timestamp: String,
    pub threshold: f64,
    pub differences: ByBucket<BTreeMap<String, Comparison>>,
    pub regressions: Vec<Change>,
    pub improvements: Vec<Change>,
    pub summary: ComparisonSummary,
}

impl ComparisonDocument {
    pub fn from_report(report: &ComparisonReport, timestamp: impl Into<String>) -> Self {
        let mut differences: ByBucket<BTreeMap<String, Comparison>> = BTreeMap::new();
        for entry in &report.entries {
            differences
                .entry(entry.key.operation)
                .or_default()
                .entry(entry.key.size)
                .or_default()
                .insert(entry.key.subject.clone(), entry.comparison.clone());
        }
        Self {
            timestamp: timestamp.into(),
            threshold: report.config.threshold,
            differences,
            regressions: report.regressions.clone(),
            improvements: report.improvements.clone(),
            summary: report.summary.clone(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| BenchError::io(path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| BenchError::malformed(path.display().to_string(), e.to_string()))
}

fn prefix_path(path: &Path, err: BenchError) -> BenchError {
    match err {
        BenchError::MalformedInput { path: inner, reason } => {
            BenchError::malformed(format!("{}: {inner}", path.display()), reason)
        }
        other => other,
    }
}

pub fn load_run(path: &Path) -> Result<RunDocument> {
    let doc: RunDocument = read_json(path)?;
    doc.validate().map_err(|e| prefix_path(path, e))?;
    Ok(doc)
}

pub fn load_consolidated(path: &Path) -> Result<ConsolidatedDocument> {
    let doc: ConsolidatedDocument = read_json(path)?;
    doc.validate().map_err(|e| prefix_path(path, e))?;
    Ok(doc)
}

/// Load a document that is either consolidated (has a `summary`) or a raw run.
pub fn load_comparable(path: &Path) -> Result<Comparable> {
    let value: serde_json::Value = read_json(path)?;
    let malformed =
        |e: serde_json::Error| BenchError::malformed(path.display().to_string(), e.to_string());
    let comparable = if value.get("summary").is_some() {
        let doc: ConsolidatedDocument = serde_json::from_value(value).map_err(malformed)?;
        doc.validate().map_err(|e| prefix_path(path, e))?;
        Comparable::Consolidated(doc)
    } else {
        let doc: RunDocument = serde_json::from_value(value).map_err(malformed)?;
        doc.validate().map_err(|e| prefix_path(path, e))?;
        Comparable::Run(doc)
    };
    Ok(comparable)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| BenchError::malformed(path.display().to_string(), e.to_string()))?;
    fs::write(path, json).map_err(|e| BenchError::io(path, e))
}
