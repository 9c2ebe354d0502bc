//! Core types for air-quality readings.

use core::fmt;
use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use time::PrimitiveDateTime;

use crate::error::{ParseError, ParseResult, kind_of};
use crate::schema;

/// Key under which the upstream API returns its records array.
pub const RECORDS_KEY: &str = "records";

/// One record exactly as the upstream API returned it.
pub type RawRecord = Map<String, Value>;

/// Pollutant code reported by a monitoring station.
///
/// Parsing never fails: codes outside the known vocabulary are kept
/// verbatim in [`Pollutant::Other`]. Matching is case-insensitive.
///
/// ```
/// use aqi_types::Pollutant;
///
/// assert_eq!("pm2.5".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
/// assert_eq!(Pollutant::Ozone.to_string(), "OZONE");
/// assert_eq!(Pollutant::from("Benzene").to_string(), "Benzene");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Pollutant {
    /// Fine particulate matter (<= 2.5 µm).
    Pm25,
    /// Coarse particulate matter (<= 10 µm).
    Pm10,
    /// Nitrogen dioxide.
    No2,
    /// Sulphur dioxide.
    So2,
    /// Carbon monoxide.
    Co,
    /// Ground-level ozone.
    Ozone,
    /// Ammonia.
    Nh3,
    /// Any other code.
    Other(String),
}

impl Pollutant {
    /// The known pollutant vocabulary.
    pub const KNOWN: [Pollutant; 7] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Co,
        Pollutant::Ozone,
        Pollutant::Nh3,
    ];

    /// Canonical upstream code.
    pub fn code(&self) -> &str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::Co => "CO",
            Pollutant::Ozone => "OZONE",
            Pollutant::Nh3 => "NH3",
            Pollutant::Other(code) => code,
        }
    }

    /// Returns true for codes outside the known vocabulary.
    pub fn is_other(&self) -> bool {
        matches!(self, Pollutant::Other(_))
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Pollutant {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let known = Pollutant::KNOWN
            .iter()
            .find(|p| p.code().eq_ignore_ascii_case(trimmed))
            .cloned();
        Ok(known.unwrap_or_else(|| Pollutant::Other(trimmed.to_string())))
    }
}

impl From<&str> for Pollutant {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(p) => p,
            Err(never) => match never {},
        }
    }
}

impl From<String> for Pollutant {
    fn from(s: String) -> Self {
        Pollutant::from(s.as_str())
    }
}

impl From<Pollutant> for String {
    fn from(p: Pollutant) -> Self {
        p.code().to_string()
    }
}

/// The set of records returned by one fetch call.
///
/// Records are held verbatim; no coercion happens until they are turned
/// into [`Reading`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingBatch {
    records: Vec<RawRecord>,
}

impl ReadingBatch {
    /// Create a batch from already-extracted records.
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    /// Extract the records array from a decoded API response.
    ///
    /// A missing, null or non-array `records` key yields an empty batch.
    pub fn from_response(response: Value) -> ParseResult<Self> {
        let mut body = match response {
            Value::Object(map) => map,
            other => return Err(ParseError::NotAnObject(kind_of(&other))),
        };

        let items = match body.remove(RECORDS_KEY) {
            Some(Value::Array(items)) => items,
            _ => return Ok(Self::default()),
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(ParseError::RecordNotObject {
                    index,
                    found: kind_of(&other),
                }),
            })
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Self { records })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the raw records.
    pub fn iter(&self) -> impl Iterator<Item = &RawRecord> {
        self.records.iter()
    }

    /// Raw records.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Union of keys present across all records, sorted.
    pub fn columns(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Keys present in the batch that are not part of the declared schema.
    pub fn extra_columns(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|c| !schema::is_declared(c))
            .collect()
    }

    /// Declared columns that no record in the batch carries.
    pub fn missing_columns(&self) -> Vec<String> {
        let present = self.columns();
        schema::COLUMNS
            .iter()
            .filter(|c| !present.iter().any(|p| p == *c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Convert every record to a typed [`Reading`].
    pub fn readings(&self) -> Vec<Reading> {
        self.records.iter().map(Reading::from_record).collect()
    }
}

impl IntoIterator for ReadingBatch {
    type Item = RawRecord;
    type IntoIter = std::vec::IntoIter<RawRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// One pollutant measurement at one station at one time.
///
/// Every field is optional: missing or uncoercible upstream values are
/// null-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub station: Option<String>,
    /// Naive local time of the station's last update.
    #[serde(
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp",
        default
    )]
    pub last_update: Option<PrimitiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "pollutant_id")]
    pub pollutant: Option<Pollutant>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub avg_value: Option<f64>,
}

impl Reading {
    /// Build a reading from a raw record using the declared schema.
    pub fn from_record(record: &RawRecord) -> Self {
        Self {
            country: schema::text_value(record.get(schema::COUNTRY)),
            state: schema::text_value(record.get(schema::STATE)),
            city: schema::text_value(record.get(schema::CITY)),
            station: schema::text_value(record.get(schema::STATION)),
            last_update: schema::timestamp_value(record.get(schema::LAST_UPDATE)),
            latitude: schema::numeric_value(record.get(schema::LATITUDE)),
            longitude: schema::numeric_value(record.get(schema::LONGITUDE)),
            pollutant: schema::text_value(record.get(schema::POLLUTANT_ID))
                .filter(|s| !s.trim().is_empty())
                .map(Pollutant::from),
            min_value: schema::numeric_value(record.get(schema::MIN_VALUE)),
            max_value: schema::numeric_value(record.get(schema::MAX_VALUE)),
            avg_value: schema::numeric_value(record.get(schema::AVG_VALUE)),
        }
    }

    /// Logical identity of this reading.
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            station: self.station.clone(),
            pollutant: self.pollutant.as_ref().map(|p| p.code().to_string()),
            last_update: self.last_update,
        }
    }

    /// Pollutant code as text.
    pub fn pollutant_code(&self) -> Option<&str> {
        self.pollutant.as_ref().map(Pollutant::code)
    }

    /// Returns true if the reading can be placed on a map and ranked.
    pub fn is_plottable(&self) -> bool {
        self.avg_value.is_some() && self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Logical identity of a reading: station, pollutant and last update.
///
/// The store does not enforce uniqueness on this key; it is only consulted
/// when duplicate skipping is requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadingKey {
    pub station: Option<String>,
    pub pollutant: Option<String>,
    pub last_update: Option<PrimitiveDateTime>,
}

fn serialize_timestamp<S: Serializer>(
    value: &Option<PrimitiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(ts) => serializer.serialize_some(&schema::format_iso(*ts)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PrimitiveDateTime>, D::Error> {
    let text: Option<String> = Option::deserialize(deserializer)?;
    Ok(text.and_then(|s| schema::parse_iso(&s).or_else(|| schema::parse_last_update(&s))))
}
