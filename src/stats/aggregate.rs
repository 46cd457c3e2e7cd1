use serde::{Deserialize, Serialize};

/// One timed execution of a subject's operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trial {
    pub duration_ms: f64,
    /// `None` when the prober could not measure memory.
    pub memory_delta_bytes: Option<i64>,
    pub succeeded: bool,
}

impl Trial {
    pub fn success(duration_ms: f64, memory_delta_bytes: Option<i64>) -> Self {
        Self {
            duration_ms,
            memory_delta_bytes,
            succeeded: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            duration_ms: 0.0,
            memory_delta_bytes: None,
            succeeded: false,
        }
    }

    fn is_usable(&self) -> bool {
        self.succeeded && self.duration_ms.is_finite() && self.duration_ms >= 0.0
    }
}

/// Aggregate over the successful trials of one `(subject, operation, size)`
/// under one version label.
///
/// Serialized as the raw result record `{avg, min, max, memory, iterations}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    /// Mean memory delta in bytes; `None` when never measured.
    #[serde(default)]
    pub memory: Option<f64>,
    pub iterations: u32,
}

/// Reduce raw trials into a [`Summary`].
///
/// Failed trials are skipped with a warning. Returns `None` when no trial
/// succeeded: an untested subject is not a zero-cost subject.
pub fn aggregate(trials: &[Trial], requested: usize) -> Option<Summary> {
    let mut count = 0u32;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut mem_sum = 0.0f64;
    let mut mem_count = 0u32;

    for (i, trial) in trials.iter().enumerate() {
        if !trial.is_usable() {
            tracing::warn!(
                trial = i,
                succeeded = trial.succeeded,
                duration_ms = trial.duration_ms,
                "skipping failed trial"
            );
            continue;
        }
        count += 1;
        sum += trial.duration_ms;
        min = min.min(trial.duration_ms);
        max = max.max(trial.duration_ms);
        if let Some(mem) = trial.memory_delta_bytes {
            mem_sum += mem as f64;
            mem_count += 1;
        }
    }

    if count == 0 {
        tracing::warn!(requested, "no successful trials; leaving result untested");
        return None;
    }
    if (count as usize) < requested {
        tracing::debug!(requested, succeeded = count, "fewer trials than requested");
    }

    // Summation error must not push the mean outside the observed range.
    let avg = (sum / count as f64).clamp(min, max);
    let memory = (mem_count > 0).then(|| mem_sum / mem_count as f64);

    Some(Summary {
        avg,
        min,
        max,
        memory,
        iterations: count,
    })
}
