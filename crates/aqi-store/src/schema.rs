//! SQLite table layout for the append store.

use rusqlite::Connection;

use aqi_types::schema::COLUMNS;

use crate::error::{Error, Result};

/// Default table name.
pub const DEFAULT_TABLE: &str = "readings";

/// Check that `table` is a plain identifier safe to splice into SQL.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid && !table.to_ascii_lowercase().starts_with("sqlite_") {
        Ok(())
    } else {
        Err(Error::InvalidTable(table.to_string()))
    }
}

/// Create the readings table if missing, or verify an existing one.
///
/// An existing table must carry every declared column; extra columns are
/// tolerated and left untouched.
pub fn initialize(conn: &Connection, table: &str) -> Result<()> {
    validate_table_name(table)?;

    if table_exists(conn, table)? {
        verify_columns(conn, table)?;
    } else {
        create_table(conn, table)?;
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn create_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ingested_at INTEGER NOT NULL,
            country TEXT,
            state TEXT,
            city TEXT,
            station TEXT,
            last_update TEXT,
            latitude REAL,
            longitude REAL,
            pollutant_id TEXT,
            min_value REAL,
            max_value REAL,
            avg_value REAL
        );
        CREATE INDEX IF NOT EXISTS "idx_{table}_identity"
            ON "{table}"(station, pollutant_id, last_update);
        "#
    ))?;
    Ok(())
}

/// Column names of an existing table.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn verify_columns(conn: &Connection, table: &str) -> Result<()> {
    let existing = table_columns(conn, table)?;
    let missing: Vec<&str> = COLUMNS
        .iter()
        .chain(["id", "ingested_at"].iter())
        .filter(|c| !existing.iter().any(|e| e.eq_ignore_ascii_case(c)))
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaMismatch {
            location: format!("table '{}'", table),
            detail: format!("missing columns {}", missing.join(", ")),
        })
    }
}
