//! The declared column schema and value coercion rules.
//!
//! Upstream records are flat JSON objects whose key set is not guaranteed.
//! Rather than inferring a table layout from whatever the first batch
//! happened to contain, every store uses the fixed column list below:
//! keys outside it are ignored, keys missing from a record become nulls.

use serde_json::Value;
use time::PrimitiveDateTime;
use time::macros::format_description;

/// Station country.
pub const COUNTRY: &str = "country";
/// State (or union territory) name.
pub const STATE: &str = "state";
/// City name.
pub const CITY: &str = "city";
/// Monitoring station name.
pub const STATION: &str = "station";
/// Last update time, `DD-MM-YYYY HH:MM:SS` upstream.
pub const LAST_UPDATE: &str = "last_update";
/// Station latitude.
pub const LATITUDE: &str = "latitude";
/// Station longitude.
pub const LONGITUDE: &str = "longitude";
/// Pollutant code.
pub const POLLUTANT_ID: &str = "pollutant_id";
/// Minimum value over the averaging window.
pub const MIN_VALUE: &str = "min_value";
/// Maximum value over the averaging window.
pub const MAX_VALUE: &str = "max_value";
/// Average value over the averaging window.
pub const AVG_VALUE: &str = "avg_value";

/// Every column of the declared schema, in upstream field order.
///
/// This is also the header row of the flat-file store.
pub const COLUMNS: [&str; 11] = [
    COUNTRY,
    STATE,
    CITY,
    STATION,
    LAST_UPDATE,
    LATITUDE,
    LONGITUDE,
    POLLUTANT_ID,
    MIN_VALUE,
    MAX_VALUE,
    AVG_VALUE,
];

/// Returns true if `name` is one of the declared columns.
pub fn is_declared(name: &str) -> bool {
    COLUMNS.contains(&name)
}

/// Parse an upstream `last_update` value (`DD-MM-YYYY HH:MM:SS`).
///
/// Anything that does not match the format yields `None`.
///
/// ```
/// use aqi_types::schema::{format_iso, parse_last_update};
///
/// let ts = parse_last_update("01-01-2024 10:00:00").unwrap();
/// assert_eq!(format_iso(ts), "2024-01-01T10:00:00");
/// assert!(parse_last_update("2024-01-01T10:00:00").is_none());
/// ```
pub fn parse_last_update(value: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        value.trim(),
        format_description!("[day]-[month]-[year] [hour]:[minute]:[second]"),
    )
    .ok()
}

/// Format a timestamp back into the upstream `DD-MM-YYYY HH:MM:SS` shape.
pub fn format_last_update(value: PrimitiveDateTime) -> String {
    value
        .format(format_description!(
            "[day]-[month]-[year] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

/// Format a timestamp as a sortable `YYYY-MM-DDTHH:MM:SS` string.
pub fn format_iso(value: PrimitiveDateTime) -> String {
    value
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

/// Parse a `YYYY-MM-DDTHH:MM:SS` (or space-separated) timestamp.
pub fn parse_iso(value: &str) -> Option<PrimitiveDateTime> {
    let value = value.trim();
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
    })
    .ok()
}

/// Coerce a JSON value into a text cell.
///
/// Strings are kept verbatim; other scalars are stringified. Nulls and
/// nested structures yield `None`.
pub fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Coerce a JSON value into a numeric cell.
///
/// Numbers and numeric strings parse; empty strings, `NA` markers and
/// non-finite values yield `None`.
pub fn numeric_value(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_number(s)?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Parse a numeric text cell, treating `NA` and blanks as missing.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("na") {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a JSON value into a timestamp cell.
pub fn timestamp_value(value: Option<&Value>) -> Option<PrimitiveDateTime> {
    match value? {
        Value::String(s) => parse_last_update(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_parse_last_update_valid() {
        let ts = parse_last_update("01-01-2024 10:00:00").unwrap();
        assert_eq!(ts, datetime!(2024-01-01 10:00:00));

        let ts = parse_last_update("31-12-2023 23:59:59").unwrap();
        assert_eq!(ts, datetime!(2023-12-31 23:59:59));
    }

    #[test]
    fn test_parse_last_update_trims_whitespace() {
        assert_eq!(
            parse_last_update("  15-08-2024 06:30:00 "),
            Some(datetime!(2024-08-15 06:30:00))
        );
    }

    #[test]
    fn test_parse_last_update_other_formats_are_null() {
        assert!(parse_last_update("2024-01-01T10:00:00").is_none());
        assert!(parse_last_update("2024-01-01 10:00:00").is_none());
        assert!(parse_last_update("01/01/2024 10:00:00").is_none());
        assert!(parse_last_update("01-01-2024").is_none());
        assert!(parse_last_update("32-01-2024 10:00:00").is_none());
        assert!(parse_last_update("").is_none());
        assert!(parse_last_update("NA").is_none());
    }

    #[test]
    fn test_last_update_format_round_trip() {
        let ts = datetime!(2024-03-05 07:08:09);
        assert_eq!(format_last_update(ts), "05-03-2024 07:08:09");
        assert_eq!(parse_last_update(&format_last_update(ts)), Some(ts));
    }

    #[test]
    fn test_iso_format() {
        let ts = datetime!(2024-01-01 10:00:00);
        assert_eq!(format_iso(ts), "2024-01-01T10:00:00");
        assert_eq!(parse_iso("2024-01-01T10:00:00"), Some(ts));
        assert_eq!(parse_iso("2024-01-01 10:00:00"), Some(ts));
        assert!(parse_iso("01-01-2024 10:00:00").is_none());
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value(Some(&json!("120.5"))), Some(120.5));
        assert_eq!(numeric_value(Some(&json!(" 42 "))), Some(42.0));
        assert_eq!(numeric_value(Some(&json!(77.2))), Some(77.2));
        assert_eq!(numeric_value(Some(&json!("NA"))), None);
        assert_eq!(numeric_value(Some(&json!("na"))), None);
        assert_eq!(numeric_value(Some(&json!(""))), None);
        assert_eq!(numeric_value(Some(&json!("abc"))), None);
        assert_eq!(numeric_value(Some(&json!("inf"))), None);
        assert_eq!(numeric_value(Some(&json!(null))), None);
        assert_eq!(numeric_value(Some(&json!(true))), None);
        assert_eq!(numeric_value(None), None);
    }

    #[test]
    fn test_text_value() {
        assert_eq!(text_value(Some(&json!("Delhi"))), Some("Delhi".to_string()));
        assert_eq!(text_value(Some(&json!(" x "))), Some(" x ".to_string()));
        assert_eq!(text_value(Some(&json!(12))), Some("12".to_string()));
        assert_eq!(text_value(Some(&json!(null))), None);
        assert_eq!(text_value(Some(&json!(["a"]))), None);
        assert_eq!(text_value(None), None);
    }

    #[test]
    fn test_timestamp_value() {
        assert_eq!(
            timestamp_value(Some(&json!("01-01-2024 10:00:00"))),
            Some(datetime!(2024-01-01 10:00:00))
        );
        assert_eq!(timestamp_value(Some(&json!(1704103200))), None);
        assert_eq!(timestamp_value(Some(&json!("garbage"))), None);
    }

    #[test]
    fn test_declared_columns() {
        assert_eq!(COLUMNS.len(), 11);
        assert!(is_declared("avg_value"));
        assert!(is_declared("pollutant_id"));
        assert!(!is_declared("pollutant_unit"));
        assert!(!is_declared("id"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_last_update_never_panics(s in ".*") {
                let _ = parse_last_update(&s);
            }

            #[test]
            fn parse_number_never_panics(s in ".*") {
                let _ = parse_number(&s);
            }

            #[test]
            fn valid_timestamps_parse(
                day in 1u8..=28,
                month in 1u8..=12,
                year in 1990i32..=2100,
                hour in 0u8..24,
                minute in 0u8..60,
                second in 0u8..60,
            ) {
                let text = format!(
                    "{:02}-{:02}-{:04} {:02}:{:02}:{:02}",
                    day, month, year, hour, minute, second
                );
                let parsed = parse_last_update(&text).unwrap();
                prop_assert_eq!(parsed.day(), day);
                prop_assert_eq!(u8::from(parsed.month()), month);
                prop_assert_eq!(parsed.year(), year);
                prop_assert_eq!(format_last_update(parsed), text);
            }
        }
    }
}
