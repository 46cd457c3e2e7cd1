use anyhow::{bail, Context};
use archive_bench::consolidate::consolidate;
use archive_bench::dataset;
use archive_bench::discovery::{self, RunFilePattern};
use archive_bench::schema::{self, ComparisonDocument};
use archive_bench::stats::{compare, project_comparison, project_ranking, CompareConfig, Precision};
use archive_bench::{BucketKey, DatasetSize, Operation};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge per-version run documents into one ranked, consolidated document.
    Consolidate {
        /// Directory holding `<prefix><label>.json` run documents.
        #[arg(long, value_name = "DIR")]
        results_dir: PathBuf,

        /// File name prefix of run documents; the rest of the stem is the version label.
        #[arg(long, default_value = "benchmark-node")]
        prefix: String,
    },

    /// Compare a current document against a baseline and classify every entry.
    Compare {
        /// Baseline document (consolidated or raw run). Defaults to the first
        /// of baseline-results.json, consolidated-results.json, latest.json in
        /// the current document's directory, skipping the current document
        /// itself. A given path that does not exist is an error.
        #[arg(long, value_name = "FILE")]
        baseline: Option<PathBuf>,

        /// Current document (consolidated or raw run).
        #[arg(long, value_name = "FILE")]
        current: PathBuf,

        /// Regression threshold as a fraction (0.05 = 5%).
        #[arg(long, env = "ARCHIVE_BENCH_THRESHOLD", default_value_t = 0.05)]
        threshold: f64,

        /// Exit with status 1 when any regression is detected.
        #[arg(long, default_value_t = false)]
        fail_on_regression: bool,

        /// Log the N largest regressions and improvements.
        #[arg(long, default_value_t = 3)]
        top: usize,

        /// Emit display rows instead of the comparison document.
        #[arg(long, default_value_t = false)]
        rows: bool,
    },

    /// Print display rows for the rankings of a consolidated document.
    Rankings {
        #[arg(long, value_name = "FILE")]
        consolidated: PathBuf,

        /// Restrict to one operation.
        #[arg(long, value_enum)]
        operation: Option<Operation>,

        /// Restrict to one dataset size.
        #[arg(long, value_enum)]
        size: Option<DatasetSize>,
    },

    /// Generate deterministic payloads for every dataset size.
    GenerateDataset {
        /// Output directory for payloads and manifest.
        #[arg(long, short = 'o', value_name = "DIR")]
        output: PathBuf,

        /// Random seed for deterministic generation.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Sizes to generate; all when omitted.
        #[arg(long, value_enum, num_args = 1.., action = clap::ArgAction::Append)]
        size: Vec<DatasetSize>,
    },

    /// Verify and describe a generated dataset directory.
    DatasetInfo {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "archive-bench")]
#[command(about = "Archive library benchmark consolidation and regression detection (JSON output)")]
struct Args {
    /// Where to write the JSON output. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence when set).
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn now_utc_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn emit<T: Serialize>(out: Option<&Path>, value: &T) -> anyhow::Result<()> {
    match out {
        Some(path) => schema::write_json(path, value)?,
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Copy `current` to `target` without ever replacing an existing file.
fn save_baseline(current: &Path, target: &Path) -> anyhow::Result<()> {
    if target.exists() {
        bail!("refusing to overwrite existing baseline {}", target.display());
    }
    let mut src = File::open(current).with_context(|| format!("opening {}", current.display()))?;
    let mut dst = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .with_context(|| format!("saving baseline to {}", target.display()))?;
    io::copy(&mut src, &mut dst)
        .with_context(|| format!("saving baseline to {}", target.display()))?;
    Ok(())
}

struct CompareArgs {
    baseline: Option<PathBuf>,
    current: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    top: usize,
    rows: bool,
}

fn run_compare(args: CompareArgs, out: Option<&Path>) -> anyhow::Result<ExitCode> {
    let CompareArgs {
        baseline,
        current,
        threshold,
        fail_on_regression,
        top,
        rows,
    } = args;
    let current = current.as_path();
    let config = CompareConfig::with_threshold(threshold)?;
    let current_doc = schema::load_comparable(current)?;

    let dir = current.parent().unwrap_or_else(|| Path::new("."));
    let baseline_path = match baseline {
        Some(path) => {
            if !path.is_file() {
                bail!("baseline {} does not exist", path.display());
            }
            path
        }
        None => match discovery::resolve_baseline(dir, current) {
            Some(path) => path,
            None => {
                // First run: the current results become the baseline for next time.
                let target = dir.join(discovery::BASELINE_CANDIDATES[0]);
                save_baseline(current, &target)?;
                tracing::warn!(
                    baseline = %target.display(),
                    "no baseline found; saved current results as baseline"
                );
                let saved = json!({
                    "timestamp": now_utc_rfc3339(),
                    "baseline": null,
                    "savedBaseline": target,
                });
                emit(out, &saved)?;
                return Ok(ExitCode::SUCCESS);
            }
        },
    };
    tracing::info!(baseline = %baseline_path.display(), "comparing against baseline");

    let baseline_doc = schema::load_comparable(&baseline_path)?;
    let report = compare(
        &baseline_doc.merged_entries(),
        &current_doc.merged_entries(),
        &config,
    )
    .with_context(|| format!("comparing against {}", baseline_path.display()))?;

    for change in report.top_regressions(top) {
        tracing::warn!(
            library = %change.library,
            operation = %change.operation,
            size = %change.size,
            change_pct = change.change,
            "regression"
        );
    }
    for change in report.top_improvements(top) {
        tracing::info!(
            library = %change.library,
            operation = %change.operation,
            size = %change.size,
            change_pct = change.change,
            "improvement"
        );
    }
    tracing::info!(
        total = report.summary.total_libraries,
        regressions = report.summary.regressions,
        improvements = report.summary.improvements,
        unchanged = report.summary.unchanged,
        "comparison summary"
    );

    if rows {
        emit(out, &project_comparison(&report, &Precision::default()))?;
    } else {
        emit(out, &ComparisonDocument::from_report(&report, now_utc_rfc3339()))?;
    }

    if fail_on_regression && report.has_regressions() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let out = args.out.as_deref();

    match args.cmd {
        Command::Consolidate {
            results_dir,
            prefix,
        } => {
            let runs = discovery::load_runs(&results_dir, &RunFilePattern::new(prefix))?;
            if runs.is_empty() {
                bail!("no run documents in {}", results_dir.display());
            }
            let doc = consolidate(runs, now_utc_rfc3339());
            emit(out, &doc)?;
        }
        Command::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            top,
            rows,
        } => {
            let compare_args = CompareArgs {
                baseline,
                current,
                threshold,
                fail_on_regression,
                top,
                rows,
            };
            return run_compare(compare_args, out);
        }
        Command::Rankings {
            consolidated,
            operation,
            size,
        } => {
            let doc = schema::load_consolidated(&consolidated)?;
            let precision = Precision::default();
            let mut buckets = Vec::new();
            for op in Operation::ALL {
                if operation.is_some_and(|o| o != op) {
                    continue;
                }
                for sz in DatasetSize::ALL {
                    if size.is_some_and(|s| s != sz) {
                        continue;
                    }
                    let rows = project_ranking(doc.ranking(BucketKey::new(op, sz)), &precision);
                    buckets.push(json!({ "operation": op, "size": sz, "rows": rows }));
                }
            }
            emit(out, &buckets)?;
        }
        Command::GenerateDataset { output, seed, size } => {
            let sizes = if size.is_empty() {
                DatasetSize::ALL.to_vec()
            } else {
                size
            };
            let start = std::time::Instant::now();
            let manifest = dataset::write_datasets(&output, seed, &sizes)?;
            tracing::info!(
                dir = %output.display(),
                elapsed_s = start.elapsed().as_secs_f64(),
                "dataset generated"
            );
            emit(out, &manifest)?;
        }
        Command::DatasetInfo { path } => {
            let payloads = dataset::load_payloads(&path)?;
            let manifest = dataset::read_manifest(&path)?;
            for (size, payload) in &payloads {
                tracing::info!(%size, bytes = payload.len(), "verified payload");
            }
            emit(out, &manifest)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
