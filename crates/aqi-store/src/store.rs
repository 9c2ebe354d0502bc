//! The store abstraction shared by the flat-file and SQLite backends.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use aqi_types::{Reading, ReadingKey};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flat_file::CsvStore;
use crate::queries::ReadingQuery;
use crate::sqlite::SqliteStore;

/// What to do with a reading whose identity is already stored.
///
/// Identity is [`ReadingKey`]: station, pollutant and last update. The
/// store itself never enforces uniqueness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Append every row, so overlapping fetch windows accumulate duplicates.
    #[default]
    KeepAll,
    /// Skip rows whose identity is already stored or appears earlier in the batch.
    SkipExisting,
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupPolicy::KeepAll => f.write_str("keep-all"),
            DedupPolicy::SkipExisting => f.write_str("skip-existing"),
        }
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep-all" | "keep_all" | "keep" => Ok(DedupPolicy::KeepAll),
            "skip-existing" | "skip_existing" | "skip" => Ok(DedupPolicy::SkipExisting),
            other => Err(format!(
                "unknown dedup policy '{}': expected keep-all or skip-existing",
                other
            )),
        }
    }
}

/// Result of one append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    /// Rows added to the store.
    pub written: usize,
    /// Rows skipped as duplicates.
    pub skipped: usize,
}

/// A durable destination for readings.
pub trait ReadingStore {
    /// Append readings, applying `policy` to rows already present.
    fn append(&mut self, readings: &[Reading], policy: DedupPolicy) -> Result<AppendOutcome>;

    /// Read back readings matching `query`.
    fn query(&self, query: &ReadingQuery) -> Result<Vec<Reading>>;

    /// Total number of stored rows.
    fn count(&self) -> Result<u64>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Where readings are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Comma-separated file with a header row.
    Csv {
        path: PathBuf,
        /// Rewrite the file from scratch on every append.
        overwrite: bool,
    },
    /// A table inside a SQLite database file.
    Sqlite { path: PathBuf, table: String },
}

impl StoreTarget {
    /// Open the target. Files are created lazily on first write.
    pub fn open(&self) -> Result<Box<dyn ReadingStore>> {
        match self {
            StoreTarget::Csv { path, overwrite } => {
                Ok(Box::new(CsvStore::new(path.clone(), *overwrite)))
            }
            StoreTarget::Sqlite { path, table } => Ok(Box::new(SqliteStore::open(path, table)?)),
        }
    }

    /// Open the target for reading; fails with [`Error::NotFound`] if the
    /// file has never been written.
    pub fn open_existing(&self) -> Result<Box<dyn ReadingStore>> {
        if !self.path().exists() {
            return Err(Error::NotFound(self.path().to_path_buf()));
        }
        self.open()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        match self {
            StoreTarget::Csv { path, .. } | StoreTarget::Sqlite { path, .. } => path,
        }
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTarget::Csv { path, overwrite } => write!(
                f,
                "csv:{} ({})",
                path.display(),
                if *overwrite { "overwrite" } else { "append" }
            ),
            StoreTarget::Sqlite { path, table } => {
                write!(f, "sqlite:{}#{}", path.display(), table)
            }
        }
    }
}

/// Tracks identities seen so far while applying a [`DedupPolicy`].
pub(crate) struct DedupFilter {
    policy: DedupPolicy,
    seen: HashSet<ReadingKey>,
}

impl DedupFilter {
    pub(crate) fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
        }
    }

    /// Seed with identities already in the store.
    pub(crate) fn with_existing<I: IntoIterator<Item = ReadingKey>>(mut self, keys: I) -> Self {
        if self.policy == DedupPolicy::SkipExisting {
            self.seen.extend(keys);
        }
        self
    }

    /// Returns true if `reading` should be written.
    pub(crate) fn admit(&mut self, reading: &Reading) -> bool {
        match self.policy {
            DedupPolicy::KeepAll => true,
            DedupPolicy::SkipExisting => self.seen.insert(reading.key()),
        }
    }
}
