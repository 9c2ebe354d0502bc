//! Flat-file mode: readings written to a CSV file with a header row.
//!
//! The header is always the declared column list. Timestamps are written
//! back in the upstream `DD-MM-YYYY HH:MM:SS` form and nulls as empty cells.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::{debug, info};

use aqi_types::schema::{self, COLUMNS, format_last_update, parse_iso, parse_last_update, parse_number};
use aqi_types::{Pollutant, Reading};

use crate::error::{Error, Result};
use crate::queries::ReadingQuery;
use crate::store::{AppendOutcome, DedupFilter, DedupPolicy, ReadingStore};

/// CSV-backed store.
///
/// In overwrite mode each append replaces the file with the new batch. In
/// append mode rows accumulate and the header is written only once.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    overwrite: bool,
}

impl CsvStore {
    /// Create a store for `path`. Nothing touches the disk until the first append.
    pub fn new(path: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            path: path.into(),
            overwrite,
        }
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if appends replace the file.
    pub fn overwrites(&self) -> bool {
        self.overwrite
    }

    fn has_content(&self) -> Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn verify_header(&self) -> Result<()> {
        let mut reader = ReaderBuilder::new().from_path(&self.path)?;
        let headers = reader.headers()?;

        if headers.iter().map(str::trim).eq(COLUMNS.iter().copied()) {
            Ok(())
        } else {
            Err(Error::SchemaMismatch {
                location: self.path.display().to_string(),
                detail: format!(
                    "header is [{}], expected [{}]",
                    headers.iter().collect::<Vec<_>>().join(","),
                    COLUMNS.join(",")
                ),
            })
        }
    }

    fn read_all(&self) -> Result<Vec<Reading>> {
        if !self.has_content()? {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let positions: Vec<Option<usize>> = COLUMNS
            .iter()
            .map(|c| headers.iter().position(|h| h.trim() == *c))
            .collect();

        let mut readings = Vec::new();
        for row in reader.records() {
            readings.push(reading_from_record(&row?, &positions));
        }

        debug!("Read {} rows from {}", readings.len(), self.path.display());
        Ok(readings)
    }
}

impl ReadingStore for CsvStore {
    fn append(&mut self, readings: &[Reading], policy: DedupPolicy) -> Result<AppendOutcome> {
        self.ensure_parent()?;

        let existing = !self.overwrite && self.has_content()?;
        if existing {
            self.verify_header()?;
        }

        let known = match policy {
            DedupPolicy::SkipExisting if existing => {
                self.read_all()?.iter().map(Reading::key).collect()
            }
            _ => Vec::new(),
        };
        let mut filter = DedupFilter::new(policy).with_existing(known);

        let file = if self.overwrite {
            File::create(&self.path)?
        } else {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?
        };

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        if !existing {
            writer.write_record(COLUMNS)?;
        }

        let mut outcome = AppendOutcome::default();
        for reading in readings {
            if !filter.admit(reading) {
                outcome.skipped += 1;
                continue;
            }
            writer.write_record(record_from_reading(reading))?;
            outcome.written += 1;
        }
        writer.flush()?;

        info!(
            "Wrote {} rows to {} ({} skipped)",
            outcome.written,
            self.describe(),
            outcome.skipped
        );
        Ok(outcome)
    }

    fn query(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        Ok(query.apply(self.read_all()?))
    }

    fn count(&self) -> Result<u64> {
        Ok(self.read_all()?.len() as u64)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

fn record_from_reading(reading: &Reading) -> [String; 11] {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let number = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();

    [
        text(&reading.country),
        text(&reading.state),
        text(&reading.city),
        text(&reading.station),
        reading.last_update.map(format_last_update).unwrap_or_default(),
        number(reading.latitude),
        number(reading.longitude),
        reading.pollutant_code().unwrap_or_default().to_string(),
        number(reading.min_value),
        number(reading.max_value),
        number(reading.avg_value),
    ]
}

fn cell<'a>(record: &'a StringRecord, positions: &[Option<usize>], column: &str) -> Option<&'a str> {
    let index = COLUMNS.iter().position(|c| *c == column)?;
    positions[index].and_then(|p| record.get(p))
}

fn reading_from_record(record: &StringRecord, positions: &[Option<usize>]) -> Reading {
    let text = |column: &str| {
        cell(record, positions, column)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let number = |column: &str| cell(record, positions, column).and_then(parse_number);

    Reading {
        country: text(schema::COUNTRY),
        state: text(schema::STATE),
        city: text(schema::CITY),
        station: text(schema::STATION),
        last_update: cell(record, positions, schema::LAST_UPDATE)
            .and_then(|s| parse_last_update(s).or_else(|| parse_iso(s))),
        latitude: number(schema::LATITUDE),
        longitude: number(schema::LONGITUDE),
        pollutant: cell(record, positions, schema::POLLUTANT_ID)
            .filter(|s| !s.trim().is_empty())
            .map(Pollutant::from),
        min_value: number(schema::MIN_VALUE),
        max_value: number(schema::MAX_VALUE),
        avg_value: number(schema::AVG_VALUE),
    }
}
