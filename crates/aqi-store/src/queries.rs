//! Query builder for stored readings.
//!
//! [`ReadingQuery`] follows the builder pattern. The SQLite store compiles
//! it to SQL; the flat-file store evaluates it in memory with
//! [`ReadingQuery::matches`] and [`ReadingQuery::apply`], and both give the
//! same answer.
//!
//! # Example
//!
//! ```
//! use aqi_store::{ReadingQuery, ReadingStore, SqliteStore};
//! use aqi_types::Pollutant;
//!
//! let store = SqliteStore::open_in_memory()?;
//!
//! let query = ReadingQuery::new()
//!     .pollutant(Pollutant::Pm25)
//!     .state("Delhi")
//!     .limit(20);
//!
//! let readings = store.query(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), aqi_store::Error>(())
//! ```

use aqi_types::schema::format_iso;
use aqi_types::{Pollutant, Reading};
use time::PrimitiveDateTime;

/// Fluent query builder for stored readings.
///
/// Text filters are trimmed and compared case-insensitively. By default
/// results are ordered by `last_update` descending (newest first).
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by pollutant.
    pub pollutant: Option<Pollutant>,
    /// Keep only these states (empty = all).
    pub states: Vec<String>,
    /// Filter by city.
    pub city: Option<String>,
    /// Filter by station.
    pub station: Option<String>,
    /// Readings updated at or after this time.
    pub since: Option<PrimitiveDateTime>,
    /// Readings updated at or before this time.
    pub until: Option<PrimitiveDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by last_update descending.
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a query matching everything, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by pollutant.
    pub fn pollutant(mut self, pollutant: Pollutant) -> Self {
        self.pollutant = Some(pollutant);
        self
    }

    /// Add a state to the allowed set.
    pub fn state(mut self, state: &str) -> Self {
        self.states.push(state.trim().to_string());
        self
    }

    /// Replace the allowed state set.
    pub fn states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.states = states
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .collect();
        self
    }

    /// Filter by city.
    pub fn city(mut self, city: &str) -> Self {
        self.city = Some(city.trim().to_string());
        self
    }

    /// Filter by station.
    pub fn station(mut self, station: &str) -> Self {
        self.station = Some(station.trim().to_string());
        self
    }

    /// Readings updated at or after this time.
    pub fn since(mut self, time: PrimitiveDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Readings updated at or before this time.
    pub fn until(mut self, time: PrimitiveDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order by oldest first.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Returns true if `reading` passes every filter.
    pub fn matches(&self, reading: &Reading) -> bool {
        if let Some(ref wanted) = self.pollutant {
            match reading.pollutant_code() {
                Some(code) if code.trim().eq_ignore_ascii_case(wanted.code()) => {}
                _ => return false,
            }
        }

        if !self.states.is_empty() {
            let Some(state) = reading.state.as_deref() else {
                return false;
            };
            if !self
                .states
                .iter()
                .any(|s| s.eq_ignore_ascii_case(state.trim()))
            {
                return false;
            }
        }

        if !text_matches(self.city.as_deref(), reading.city.as_deref()) {
            return false;
        }
        if !text_matches(self.station.as_deref(), reading.station.as_deref()) {
            return false;
        }

        if let Some(since) = self.since
            && reading.last_update.is_none_or(|ts| ts < since)
        {
            return false;
        }
        if let Some(until) = self.until
            && reading.last_update.is_none_or(|ts| ts > until)
        {
            return false;
        }

        true
    }

    /// Filter, order and paginate an in-memory set of readings.
    ///
    /// Ordering is stable, so readings sharing a timestamp keep their
    /// insertion order (reversed when newest first, as with row ids).
    pub fn apply(&self, readings: Vec<Reading>) -> Vec<Reading> {
        let mut matched: Vec<Reading> = readings.into_iter().filter(|r| self.matches(r)).collect();

        if self.newest_first {
            matched.reverse();
            matched.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        } else {
            matched.sort_by(|a, b| a.last_update.cmp(&b.last_update));
        }

        let offset = self.offset.unwrap_or(0) as usize;
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref pollutant) = self.pollutant {
            conditions.push("TRIM(pollutant_id) = ? COLLATE NOCASE".to_string());
            params.push(Box::new(pollutant.code().to_string()));
        }

        if !self.states.is_empty() {
            let placeholders = vec!["?"; self.states.len()].join(", ");
            conditions.push(format!("TRIM(state) COLLATE NOCASE IN ({})", placeholders));
            for state in &self.states {
                params.push(Box::new(state.clone()));
            }
        }

        if let Some(ref city) = self.city {
            conditions.push("TRIM(city) = ? COLLATE NOCASE".to_string());
            params.push(Box::new(city.clone()));
        }

        if let Some(ref station) = self.station {
            conditions.push("TRIM(station) = ? COLLATE NOCASE".to_string());
            params.push(Box::new(station.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("last_update >= ?".to_string());
            params.push(Box::new(format_iso(since)));
        }

        if let Some(until) = self.until {
            conditions.push("last_update <= ?".to_string());
            params.push(Box::new(format_iso(until)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query against `table`.
    pub(crate) fn build_sql(&self, table: &str) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT country, state, city, station, last_update, latitude, longitude, \
             pollutant_id, min_value, max_value, avg_value \
             FROM \"{}\" {} ORDER BY last_update {}, id {}",
            table, where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        } else if self.offset.is_some() {
            sql.push_str(" LIMIT -1");
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

fn text_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(w), Some(a)) => a.trim().eq_ignore_ascii_case(w),
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn reading(station: &str, state: &str, pollutant: Pollutant, ts: PrimitiveDateTime) -> Reading {
        Reading {
            station: Some(station.to_string()),
            state: Some(state.to_string()),
            city: Some("City".to_string()),
            pollutant: Some(pollutant),
            last_update: Some(ts),
            avg_value: Some(10.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_query() {
        let query = ReadingQuery::new();
        assert!(query.newest_first);
        assert!(query.pollutant.is_none());
        assert!(query.states.is_empty());

        let (where_clause, params) = query.build_where();
        assert!(where_clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_sql_with_filters() {
        let query = ReadingQuery::new()
            .pollutant(Pollutant::No2)
            .states(["Delhi", "Bihar"])
            .limit(5)
            .offset(10);

        let sql = query.build_sql("readings");
        assert!(sql.contains("FROM \"readings\""));
        assert!(sql.contains("pollutant_id"));
        assert!(sql.contains("IN (?, ?)"));
        assert!(sql.contains("ORDER BY last_update DESC"));
        assert!(sql.contains("LIMIT 5"));
        assert!(sql.contains("OFFSET 10"));

        let (_, params) = query.build_where();
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_offset_without_limit() {
        let sql = ReadingQuery::new().oldest_first().offset(3).build_sql("t");
        assert!(sql.contains("ORDER BY last_update ASC"));
        assert!(sql.contains("LIMIT -1 OFFSET 3"));
    }

    #[test]
    fn test_matches_pollutant_and_state() {
        let r = reading("S1", " delhi ", Pollutant::Pm25, datetime!(2024-01-01 10:00:00));

        assert!(ReadingQuery::new().matches(&r));
        assert!(ReadingQuery::new().pollutant(Pollutant::Pm25).matches(&r));
        assert!(!ReadingQuery::new().pollutant(Pollutant::Pm10).matches(&r));
        assert!(ReadingQuery::new().state("Delhi").matches(&r));
        assert!(ReadingQuery::new().states(["Bihar", "DELHI"]).matches(&r));
        assert!(!ReadingQuery::new().state("Bihar").matches(&r));
        assert!(ReadingQuery::new().station("s1").matches(&r));
        assert!(!ReadingQuery::new().city("Patna").matches(&r));
    }

    #[test]
    fn test_matches_time_range_excludes_null_timestamps() {
        let mut r = reading("S1", "Delhi", Pollutant::Pm25, datetime!(2024-01-02 00:00:00));
        let query = ReadingQuery::new()
            .since(datetime!(2024-01-01 00:00:00))
            .until(datetime!(2024-01-03 00:00:00));
        assert!(query.matches(&r));

        r.last_update = None;
        assert!(!query.matches(&r));
        assert!(ReadingQuery::new().matches(&r));
    }

    #[test]
    fn test_apply_orders_and_paginates() {
        let readings = vec![
            reading("A", "Delhi", Pollutant::Pm25, datetime!(2024-01-01 10:00:00)),
            reading("B", "Delhi", Pollutant::Pm25, datetime!(2024-01-03 10:00:00)),
            reading("C", "Delhi", Pollutant::Pm10, datetime!(2024-01-02 10:00:00)),
            reading("D", "Delhi", Pollutant::Pm25, datetime!(2024-01-02 10:00:00)),
        ];

        let newest = ReadingQuery::new().pollutant(Pollutant::Pm25).apply(readings.clone());
        let stations: Vec<_> = newest.iter().map(|r| r.station.clone().unwrap()).collect();
        assert_eq!(stations, vec!["B", "D", "A"]);

        let oldest = ReadingQuery::new().oldest_first().limit(2).offset(1).apply(readings);
        let stations: Vec<_> = oldest.iter().map(|r| r.station.clone().unwrap()).collect();
        assert_eq!(stations, vec!["C", "D"]);
    }
}
