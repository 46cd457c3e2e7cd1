use std::collections::BTreeMap;
use std::hint::black_box;
use std::time::Instant;

use crate::schema::{RunDocument, SystemInfo};
use crate::stats::{aggregate, Trial};
use crate::{DatasetSize, EntryKey, Operation};

#[derive(Clone, Copy, Debug)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    /// Overrides the profile's trial count.
    pub trials: Option<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Quick,
            trials: None,
        }
    }
}

impl BenchConfig {
    pub fn warmup_trials(&self) -> usize {
        match self.profile {
            Profile::Quick => 1,
            Profile::Full => 3,
        }
    }

    pub fn trials(&self) -> usize {
        self.trials.unwrap_or(match self.profile {
            Profile::Quick => 5,
            Profile::Full => 20,
        })
    }
}

/// An interchangeable implementation under test.
pub trait Subject: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self) -> &[Operation];

    /// Perform one operation over the dataset payload.
    fn run(&self, operation: Operation, input: &[u8]) -> anyhow::Result<()>;
}

/// Subjects available for this run, in registration order.
#[derive(Default)]
pub struct SubjectRegistry {
    subjects: Vec<Box<dyn Subject>>,
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subject; a second subject with an already known name is
    /// rejected and logged.
    pub fn register(&mut self, subject: Box<dyn Subject>) -> bool {
        if self.subjects.iter().any(|s| s.name() == subject.name()) {
            tracing::warn!(subject = subject.name(), "duplicate subject ignored");
            return false;
        }
        tracing::debug!(
            subject = subject.name(),
            supports = ?subject.supports(),
            "registered subject"
        );
        self.subjects.push(subject);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Subject> {
        self.subjects.iter().map(|s| s.as_ref())
    }

    pub fn supporting(&self, operation: Operation) -> impl Iterator<Item = &dyn Subject> {
        self.iter().filter(move |s| s.supports().contains(&operation))
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Drives a single subject call and reports it as a [`Trial`].
pub trait Prober {
    fn probe(&self, subject: &dyn Subject, operation: Operation, input: &[u8]) -> Trial;
}

/// Wall-clock prober. Memory is not measured, so trials carry `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimingProber;

impl Prober for TimingProber {
    fn probe(&self, subject: &dyn Subject, operation: Operation, input: &[u8]) -> Trial {
        let start = Instant::now();
        let outcome = subject.run(operation, black_box(input));
        let elapsed = start.elapsed();

        match outcome {
            Ok(()) => Trial::success(elapsed.as_secs_f64() * 1000.0, None),
            Err(e) => {
                tracing::warn!(subject = subject.name(), %operation, error = %e, "trial failed");
                Trial::failed()
            }
        }
    }
}

/// Benchmark every registered subject on every payload and supported
/// operation, returning the run document.
///
/// Only summaries backed by at least one successful trial are recorded.
pub fn run_suite(
    registry: &SubjectRegistry,
    prober: &dyn Prober,
    payloads: &BTreeMap<DatasetSize, Vec<u8>>,
    cfg: &BenchConfig,
    system_info: SystemInfo,
    timestamp: impl Into<String>,
) -> RunDocument {
    let mut doc = RunDocument::new(timestamp, system_info);
    let trials = cfg.trials();
    tracing::info!(
        profile = cfg.profile.as_str(),
        trials,
        subjects = registry.len(),
        "starting benchmark suite"
    );

    for (size, payload) in payloads {
        for subject in registry.iter() {
            for &operation in subject.supports() {
                for _ in 0..cfg.warmup_trials() {
                    black_box(prober.probe(subject, operation, payload));
                }
                let samples: Vec<Trial> = (0..trials)
                    .map(|_| prober.probe(subject, operation, payload))
                    .collect();

                let key = EntryKey::new(operation, *size, subject.name());
                match aggregate(&samples, trials) {
                    Some(summary) => {
                        tracing::info!(entry = %key, avg_ms = summary.avg, "measured");
                        doc.insert(&key, summary);
                    }
                    None => tracing::warn!(entry = %key, "no successful trials"),
                }
            }
        }
    }

    doc
}
