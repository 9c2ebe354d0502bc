//! Fetch and ingest pipeline for data.gov.in air-quality readings.
//!
//! # Overview
//!
//! - [`fetch::Fetcher`]: one HTTP GET against the upstream resource
//! - [`ingest::Ingestor`]: appends a batch to a CSV or SQLite store
//! - [`pipeline::run`]: one fetch-then-ingest run with a terminal outcome
//! - [`summary`]: dashboard KPIs over stored readings
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use aqi_core::{Fetcher, Ingestor, StoreTarget, run};
//!
//! # async fn example() -> Result<(), aqi_core::Error> {
//! let fetcher = Fetcher::new(aqi_core::fetch::DEFAULT_API_URL, Some("my-key".into()))?;
//! let ingestor = Ingestor::new(StoreTarget::Sqlite {
//!     path: PathBuf::from("pollution_data.db"),
//!     table: "readings".into(),
//! });
//!
//! let report = run(&fetcher, &ingestor).await;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod error;
pub mod fetch;
pub mod ingest;
pub mod pipeline;
pub mod summary;

pub use error::{Error, Result};
pub use fetch::{FetchOutcome, Fetcher};
pub use ingest::{IngestResult, Ingestor};
pub use pipeline::{RunOutcome, RunReport, RunState, run};
pub use summary::{Summary, SummaryOptions, summarize};

// Re-export the layers below for convenience
pub use aqi_store::{DedupPolicy, StoreTarget};
pub use aqi_types::{Pollutant, Reading, ReadingBatch};
