use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod consolidate;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod harness;
pub mod schema;
pub mod stats;

pub use error::{BenchError, Result};

/// Archive operation a subject can be benchmarked on.
#[derive(
    Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Build an archive from the dataset payload.
    Create,
    /// Unpack an archive back into the dataset payload.
    Extract,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::Create, Operation::Extract];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Extract => "extract",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset size label. Ordered; only a partition key for the statistics.
#[derive(
    Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSize {
    /// 1 KiB payload.
    Small,
    /// 1 MiB payload.
    Medium,
    /// 10 MiB payload.
    Large,
}

impl DatasetSize {
    pub const ALL: [DatasetSize; 3] = [DatasetSize::Small, DatasetSize::Medium, DatasetSize::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetSize::Small => "small",
            DatasetSize::Medium => "medium",
            DatasetSize::Large => "large",
        }
    }

    /// Payload length used when generating test data for this size.
    pub fn bytes(&self) -> usize {
        match self {
            DatasetSize::Small => 1024,
            DatasetSize::Medium => 1024 * 1024,
            DatasetSize::Large => 10 * 1024 * 1024,
        }
    }
}

impl fmt::Display for DatasetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(operation, size)` bucket; subjects inside a bucket are ranked together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub operation: Operation,
    pub size: DatasetSize,
}

impl BucketKey {
    pub fn new(operation: Operation, size: DatasetSize) -> Self {
        Self { operation, size }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.operation, self.size)
    }
}

/// Fully qualified `(operation, size, subject)` key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub operation: Operation,
    pub size: DatasetSize,
    pub subject: String,
}

impl EntryKey {
    pub fn new(operation: Operation, size: DatasetSize, subject: impl Into<String>) -> Self {
        Self {
            operation,
            size,
            subject: subject.into(),
        }
    }

    pub fn bucket(&self) -> BucketKey {
        BucketKey::new(self.operation, self.size)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.operation, self.size, self.subject)
    }
}
