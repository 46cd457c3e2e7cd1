//! Locating result documents in a results directory.

use crate::error::{BenchError, Result};
use crate::schema::{load_run, RunDocument};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Candidate baseline files, in lookup order.
pub const BASELINE_CANDIDATES: [&str; 3] = [
    "baseline-results.json",
    "consolidated-results.json",
    "latest.json",
];

/// File naming of per-version run documents: `<prefix><label>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFilePattern {
    pub prefix: String,
}

impl Default for RunFilePattern {
    fn default() -> Self {
        Self {
            prefix: "benchmark-node".to_string(),
        }
    }
}

impl RunFilePattern {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Version label encoded in a file name, if the name matches.
    pub fn label_of(&self, file_name: &str) -> Option<String> {
        let label = file_name
            .strip_suffix(".json")?
            .strip_prefix(self.prefix.as_str())?;
        (!label.is_empty()).then(|| label.to_string())
    }
}

/// Map version label → run document path for every matching file directly
/// inside `dir`.
pub fn discover_runs(dir: &Path, pattern: &RunFilePattern) -> Result<BTreeMap<String, PathBuf>> {
    let mut out = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            BenchError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(label) = pattern.label_of(name) {
            tracing::debug!(label = %label, path = %entry.path().display(), "found run document");
            out.insert(label, entry.path().to_path_buf());
        }
    }
    Ok(out)
}

/// Discover and load every run document, validated.
pub fn load_runs(dir: &Path, pattern: &RunFilePattern) -> Result<BTreeMap<String, RunDocument>> {
    let paths = discover_runs(dir, pattern)?;
    if paths.is_empty() {
        tracing::warn!(dir = %dir.display(), prefix = %pattern.prefix, "no run documents found");
    }
    let mut runs = BTreeMap::new();
    for (label, path) in paths {
        let run = load_run(&path)?;
        tracing::info!(label = %label, "loaded run document");
        runs.insert(label, run);
    }
    Ok(runs)
}

/// First existing baseline candidate inside `dir` that is not `exclude`.
///
/// `exclude` is the document being compared; a candidate naming the same
/// file is skipped and the lookup continues with the next name.
pub fn resolve_baseline(dir: &Path, exclude: &Path) -> Option<PathBuf> {
    BASELINE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .find(|path| !same_file(path, exclude))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
