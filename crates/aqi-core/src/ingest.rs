//! Ingestor: converts a fetched batch to typed readings and appends them
//! to the configured store.

use serde::Serialize;
use tracing::{info, warn};

use aqi_store::{DedupPolicy, StoreTarget};
use aqi_types::ReadingBatch;

use crate::error::Result;

/// What one ingest call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    /// Records in the batch.
    pub rows_received: usize,
    /// Rows appended to the store.
    pub rows_written: usize,
    /// Rows skipped by the dedup policy.
    pub rows_skipped: usize,
    /// Keys present across the batch, sorted.
    pub columns: Vec<String>,
    /// Keys outside the declared schema, not persisted.
    pub ignored_fields: Vec<String>,
    /// Declared columns absent from every record, persisted as nulls.
    pub missing_fields: Vec<String>,
}

/// Appends batches to one store target.
#[derive(Debug, Clone)]
pub struct Ingestor {
    target: StoreTarget,
    dedup: DedupPolicy,
}

impl Ingestor {
    /// Create an ingestor writing to `target` with [`DedupPolicy::KeepAll`].
    pub fn new(target: StoreTarget) -> Self {
        Self {
            target,
            dedup: DedupPolicy::default(),
        }
    }

    /// Set the dedup policy.
    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    /// The store target.
    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    /// The dedup policy.
    pub fn dedup(&self) -> DedupPolicy {
        self.dedup
    }

    /// Persist `batch`.
    ///
    /// An empty batch is a no-op: the store is not opened and nothing is
    /// written. The store handle is dropped before returning.
    pub fn ingest(&self, batch: &ReadingBatch) -> Result<IngestResult> {
        if batch.is_empty() {
            info!("No records to process");
            return Ok(IngestResult::default());
        }

        let readings = batch.readings();
        let result = IngestResult {
            rows_received: readings.len(),
            columns: batch.columns(),
            ignored_fields: batch.extra_columns(),
            missing_fields: batch.missing_columns(),
            ..Default::default()
        };

        info!("Converted {} records", readings.len());
        info!("Columns: {}", result.columns.join(", "));
        if !result.ignored_fields.is_empty() {
            warn!(
                "Ignoring fields outside the declared schema: {}",
                result.ignored_fields.join(", ")
            );
        }
        if !result.missing_fields.is_empty() {
            warn!(
                "Fields missing from every record, stored as null: {}",
                result.missing_fields.join(", ")
            );
        }

        let mut store = self.target.open()?;
        let outcome = store.append(&readings, self.dedup)?;
        info!("Data saved to {}", self.target);

        Ok(IngestResult {
            rows_written: outcome.written,
            rows_skipped: outcome.skipped,
            ..result
        })
    }
}
