//! Append-store mode: readings appended to a table in a SQLite file.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Row};
use time::OffsetDateTime;
use tracing::{debug, info};

use aqi_types::schema::{format_iso, parse_iso};
use aqi_types::{Pollutant, Reading, ReadingKey};

use crate::error::{Error, Result};
use crate::queries::ReadingQuery;
use crate::schema;
use crate::store::{AppendOutcome, DedupFilter, DedupPolicy, ReadingStore};

/// SQLite-backed append-only store.
pub struct SqliteStore {
    conn: Connection,
    table: String,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a database at the given path, using `table`.
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        let path = path.as_ref();
        schema::validate_table_name(table)?;

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn, table)?;

        Ok(Self {
            conn,
            table: table.to_string(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database with the default table (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn, schema::DEFAULT_TABLE)?;
        Ok(Self {
            conn,
            table: schema::DEFAULT_TABLE.to_string(),
            path: None,
        })
    }

    /// Name of the table readings are appended to.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn existing_keys(&self) -> Result<Vec<ReadingKey>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT station, pollutant_id, last_update FROM \"{}\"",
            self.table
        ))?;

        let keys = stmt
            .query_map([], |row| {
                Ok(ReadingKey {
                    station: row.get(0)?,
                    pollutant: row
                        .get::<_, Option<String>>(1)?
                        .map(|p| Pollutant::from(p).code().to_string()),
                    last_update: row.get::<_, Option<String>>(2)?.and_then(|s| parse_iso(&s)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(keys)
    }
}

impl ReadingStore for SqliteStore {
    fn append(&mut self, readings: &[Reading], policy: DedupPolicy) -> Result<AppendOutcome> {
        let ingested_at = OffsetDateTime::now_utc().unix_timestamp();
        let existing = match policy {
            DedupPolicy::SkipExisting => self.existing_keys()?,
            DedupPolicy::KeepAll => Vec::new(),
        };
        let mut filter = DedupFilter::new(policy).with_existing(existing);
        let mut outcome = AppendOutcome::default();

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO \"{}\" (ingested_at, country, state, city, station, last_update,
                 latitude, longitude, pollutant_id, min_value, max_value, avg_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                self.table
            ))?;

            for reading in readings {
                if !filter.admit(reading) {
                    outcome.skipped += 1;
                    continue;
                }

                stmt.execute(rusqlite::params![
                    ingested_at,
                    reading.country,
                    reading.state,
                    reading.city,
                    reading.station,
                    reading.last_update.map(format_iso),
                    reading.latitude,
                    reading.longitude,
                    reading.pollutant_code(),
                    reading.min_value,
                    reading.max_value,
                    reading.avg_value,
                ])?;
                outcome.written += 1;
            }
        }
        tx.commit()?;

        info!(
            "Appended {} rows to {} ({} skipped)",
            outcome.written,
            self.describe(),
            outcome.skipped
        );
        Ok(outcome)
    }

    fn query(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let sql = query.build_sql(&self.table);
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), reading_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    fn count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}#{}", path.display(), self.table),
            None => format!("sqlite::memory:#{}", self.table),
        }
    }
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        country: row.get(0)?,
        state: row.get(1)?,
        city: row.get(2)?,
        station: row.get(3)?,
        last_update: row.get::<_, Option<String>>(4)?.and_then(|s| parse_iso(&s)),
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        pollutant: row.get::<_, Option<String>>(7)?.map(Pollutant::from),
        min_value: row.get(8)?,
        max_value: row.get(9)?,
        avg_value: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::PrimitiveDateTime;
    use time::macros::datetime;

    fn create_test_reading(station: &str, ts: PrimitiveDateTime, avg: f64) -> Reading {
        Reading {
            country: Some("India".to_string()),
            state: Some("Delhi".to_string()),
            city: Some("Delhi".to_string()),
            station: Some(station.to_string()),
            last_update: Some(ts),
            latitude: Some(28.6),
            longitude: Some(77.2),
            pollutant: Some(Pollutant::Pm25),
            min_value: Some(avg - 10.0),
            max_value: Some(avg + 10.0),
            avg_value: Some(avg),
        }
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.table(), "readings");
    }

    #[test]
    fn test_append_and_query_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let reading = create_test_reading("S1", datetime!(2024-01-01 10:00:00), 120.5);

        let outcome = store
            .append(std::slice::from_ref(&reading), DedupPolicy::KeepAll)
            .unwrap();
        assert_eq!(outcome, AppendOutcome { written: 1, skipped: 0 });

        let readings = store.query(&ReadingQuery::new()).unwrap();
        assert_eq!(readings, vec![reading]);
    }

    #[test]
    fn test_null_fields_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let sparse = Reading {
            station: Some("S9".to_string()),
            ..Default::default()
        };

        store.append(std::slice::from_ref(&sparse), DedupPolicy::KeepAll).unwrap();
        let readings = store.query(&ReadingQuery::new()).unwrap();
        assert_eq!(readings, vec![sparse]);
    }

    #[test]
    fn test_keep_all_accumulates_duplicates() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let batch_a = vec![
            create_test_reading("S1", datetime!(2024-01-01 10:00:00), 100.0),
            create_test_reading("S2", datetime!(2024-01-01 10:00:00), 80.0),
        ];
        let batch_b = vec![
            create_test_reading("S1", datetime!(2024-01-01 10:00:00), 100.0),
            create_test_reading("S1", datetime!(2024-01-01 11:00:00), 90.0),
            create_test_reading("S3", datetime!(2024-01-01 11:00:00), 60.0),
        ];

        store.append(&batch_a, DedupPolicy::KeepAll).unwrap();
        store.append(&batch_b, DedupPolicy::KeepAll).unwrap();

        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn test_skip_existing_drops_repeats() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = vec![create_test_reading("S1", datetime!(2024-01-01 10:00:00), 100.0)];
        let second = vec![
            create_test_reading("S1", datetime!(2024-01-01 10:00:00), 100.0),
            create_test_reading("S1", datetime!(2024-01-01 11:00:00), 90.0),
            create_test_reading("S1", datetime!(2024-01-01 11:00:00), 90.0),
        ];

        store.append(&first, DedupPolicy::SkipExisting).unwrap();
        let outcome = store.append(&second, DedupPolicy::SkipExisting).unwrap();

        assert_eq!(outcome, AppendOutcome { written: 1, skipped: 2 });
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_query_filters() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut bihar = create_test_reading("P1", datetime!(2024-01-02 10:00:00), 70.0);
        bihar.state = Some("Bihar".to_string());
        bihar.city = Some("Patna".to_string());
        let mut no2 = create_test_reading("S1", datetime!(2024-01-03 10:00:00), 40.0);
        no2.pollutant = Some(Pollutant::No2);
        let pm = create_test_reading("S1", datetime!(2024-01-01 10:00:00), 150.0);

        store
            .append(&[bihar, no2, pm], DedupPolicy::KeepAll)
            .unwrap();

        let pm25 = store
            .query(&ReadingQuery::new().pollutant(Pollutant::Pm25))
            .unwrap();
        assert_eq!(pm25.len(), 2);
        assert_eq!(pm25[0].station.as_deref(), Some("P1"));

        let delhi = store.query(&ReadingQuery::new().state("delhi")).unwrap();
        assert_eq!(delhi.len(), 2);

        let oldest = store
            .query(&ReadingQuery::new().oldest_first().limit(1))
            .unwrap();
        assert_eq!(oldest[0].avg_value, Some(150.0));

        let since = store
            .query(&ReadingQuery::new().since(datetime!(2024-01-02 00:00:00)))
            .unwrap();
        assert_eq!(since.len(), 2);

        let patna = store.query(&ReadingQuery::new().city("PATNA")).unwrap();
        assert_eq!(patna.len(), 1);
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("aq.db");

        {
            let mut store = SqliteStore::open(&path, "air").unwrap();
            store
                .append(
                    &[create_test_reading("S1", datetime!(2024-01-01 10:00:00), 1.0)],
                    DedupPolicy::KeepAll,
                )
                .unwrap();
        }

        assert!(path.exists());
        let reopened = SqliteStore::open(&path, "air").unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert!(reopened.describe().contains("#air"));
    }

    #[test]
    fn test_open_rejects_bad_table() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteStore::open(dir.path().join("aq.db"), "bad name");
        assert!(matches!(result, Err(Error::InvalidTable(_))));
    }
}
