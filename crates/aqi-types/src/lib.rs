//! Data model for air-quality readings published on data.gov.in.
//!
//! This crate holds the types shared by the fetcher, the stores and the
//! CLI. It performs no I/O.
//!
//! # Overview
//!
//! - [`ReadingBatch`]: the raw records returned by one API call, untouched
//! - [`Reading`]: a typed row over the declared column schema
//! - [`Pollutant`]: pollutant codes with a known vocabulary
//! - [`schema`]: column names and the value coercion rules
//!
//! # Example
//!
//! ```
//! use aqi_types::{Pollutant, ReadingBatch};
//! use serde_json::json;
//!
//! let response = json!({
//!     "records": [
//!         {"station": "S1", "pollutant_id": "PM10", "avg_value": "88"}
//!     ]
//! });
//! let batch = ReadingBatch::from_response(response)?;
//! let readings = batch.readings();
//! assert_eq!(readings[0].pollutant, Some(Pollutant::Pm10));
//! assert_eq!(readings[0].avg_value, Some(88.0));
//! # Ok::<(), aqi_types::ParseError>(())
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Pollutant, RECORDS_KEY, RawRecord, Reading, ReadingBatch, ReadingKey};
