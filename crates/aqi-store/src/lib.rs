//! Persistence for air-quality readings.
//!
//! Two storage modes sit behind the [`ReadingStore`] trait:
//!
//! - [`CsvStore`]: a flat CSV file, either rewritten per batch or appended to
//! - [`SqliteStore`]: an append-only table in a SQLite database
//!
//! Both use the declared column schema from [`aqi_types::schema`], so a
//! batch with extra keys never widens the store and a batch with missing
//! keys writes nulls.
//!
//! # Example
//!
//! ```
//! use aqi_store::{DedupPolicy, ReadingQuery, ReadingStore, SqliteStore};
//! use aqi_types::Reading;
//!
//! let mut store = SqliteStore::open_in_memory()?;
//! let reading = Reading {
//!     station: Some("S1".to_string()),
//!     avg_value: Some(42.0),
//!     ..Default::default()
//! };
//!
//! let outcome = store.append(&[reading], DedupPolicy::KeepAll)?;
//! assert_eq!(outcome.written, 1);
//! assert_eq!(store.query(&ReadingQuery::new())?.len(), 1);
//! # Ok::<(), aqi_store::Error>(())
//! ```

mod error;
mod flat_file;
mod queries;
pub mod schema;
mod sqlite;
mod store;

pub use error::{Error, Result};
pub use flat_file::CsvStore;
pub use queries::ReadingQuery;
pub use schema::DEFAULT_TABLE;
pub use sqlite::SqliteStore;
pub use store::{AppendOutcome, DedupPolicy, ReadingStore, StoreTarget};
