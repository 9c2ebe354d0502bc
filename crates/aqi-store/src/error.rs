//! Error types for aqi-store.

use std::path::PathBuf;

/// Result type for aqi-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in aqi-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Error reading or writing the flat file.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to create the store's parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The existing store does not carry the declared columns.
    #[error("Schema mismatch in {location}: {detail}")]
    SchemaMismatch { location: String, detail: String },

    /// Table name is not a plain SQL identifier.
    #[error("Invalid table name '{0}': use letters, digits and underscores")]
    InvalidTable(String),

    /// The store has never been written.
    #[error("Store not found at {0}")]
    NotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
