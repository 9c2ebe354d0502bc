//! Dashboard KPIs over stored readings.
//!
//! Readings without a value or coordinates are dropped, state and city
//! names are title-cased, and the remaining rows are filtered by one
//! pollutant and an optional set of states before the KPIs are computed.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Serialize, Serializer};
use time::PrimitiveDateTime;

use aqi_types::schema::format_iso;
use aqi_types::{Pollutant, Reading};

/// Number of cities ranked by default.
pub const DEFAULT_TOP_CITIES: usize = 10;

/// Filters applied before computing KPIs.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Pollutant to report on; `None` picks PM2.5, or the first available.
    pub pollutant: Option<Pollutant>,
    /// States to include (empty = all).
    pub states: Vec<String>,
    /// Number of cities in the ranking.
    pub top: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            pollutant: None,
            states: Vec::new(),
            top: DEFAULT_TOP_CITIES,
        }
    }
}

/// Mean value for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAverage {
    pub name: String,
    pub avg_value: f64,
}

/// The single highest reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub city: Option<String>,
    pub station: Option<String>,
    pub avg_value: f64,
}

/// Headline figures for a non-empty selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    /// Distinct stations reporting.
    pub station_count: usize,
    /// Mean of `avg_value` over the selection.
    pub mean_value: f64,
    /// Reading with the maximum `avg_value`.
    pub most_polluted: Peak,
    /// Cities by mean `avg_value`, highest first.
    pub top_cities: Vec<GroupAverage>,
    /// States by mean `avg_value`, highest first.
    pub state_averages: Vec<GroupAverage>,
}

/// Report produced by [`summarize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Pollutant the KPIs refer to.
    pub pollutant: Option<Pollutant>,
    /// States the selection was restricted to (empty = all).
    pub states: Vec<String>,
    /// Rows in the selection.
    pub rows: usize,
    /// Most recent update across the whole cleaned dataset.
    #[serde(serialize_with = "serialize_iso")]
    pub latest_update: Option<PrimitiveDateTime>,
    /// Pollutant codes available.
    pub available_pollutants: Vec<String>,
    /// States available.
    pub available_states: Vec<String>,
    /// `None` when the selection is empty.
    pub kpis: Option<Kpis>,
}

/// Title-case `text`: the first letter of each alphabetic run is upper
/// case and the rest lower case. Surrounding whitespace is trimmed.
///
/// ```
/// use aqi_core::summary::title_case;
///
/// assert_eq!(title_case("  uttar PRADESH "), "Uttar Pradesh");
/// assert_eq!(title_case("jammu-kashmir"), "Jammu-Kashmir");
/// ```
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;

    for c in text.trim().chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

/// Drop rows that cannot be ranked or mapped and normalize place names.
pub fn clean(readings: Vec<Reading>) -> Vec<Reading> {
    readings
        .into_iter()
        .filter(Reading::is_plottable)
        .map(|mut r| {
            r.state = r.state.as_deref().map(title_case);
            r.city = r.city.as_deref().map(title_case);
            r
        })
        .collect()
}

/// Compute the summary for `readings` (raw rows from a store).
pub fn summarize(readings: Vec<Reading>, options: &SummaryOptions) -> Summary {
    let data = clean(readings);

    let latest_update = data.iter().filter_map(|r| r.last_update).max();
    let available_pollutants: Vec<String> = data
        .iter()
        .filter_map(|r| r.pollutant_code())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let available_states: Vec<String> = data
        .iter()
        .filter_map(|r| r.state.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let pollutant = options.pollutant.clone().or_else(|| {
        let preferred = Pollutant::Pm25;
        if available_pollutants.iter().any(|p| p == preferred.code()) {
            Some(preferred)
        } else {
            available_pollutants.first().map(|p| Pollutant::from(p.as_str()))
        }
    });

    let states: Vec<String> = options.states.iter().map(|s| title_case(s)).collect();
    let selected: Vec<&Reading> = match &pollutant {
        Some(wanted) => data
            .iter()
            .filter(|r| r.pollutant_code() == Some(wanted.code()))
            .filter(|r| {
                states.is_empty()
                    || r.state
                        .as_deref()
                        .is_some_and(|s| states.iter().any(|w| w == s))
            })
            .collect(),
        None => Vec::new(),
    };

    Summary {
        pollutant,
        rows: selected.len(),
        kpis: compute_kpis(&selected, options.top),
        states,
        latest_update,
        available_pollutants,
        available_states,
    }
}

fn compute_kpis(selected: &[&Reading], top: usize) -> Option<Kpis> {
    let values: Vec<f64> = selected.iter().filter_map(|r| r.avg_value).collect();
    if values.is_empty() {
        return None;
    }

    let station_count = selected
        .iter()
        .filter_map(|r| r.station.as_deref())
        .collect::<HashSet<_>>()
        .len();
    let mean_value = values.iter().sum::<f64>() / values.len() as f64;

    // First occurrence wins on ties.
    let mut peak = selected[0];
    for &r in selected.iter().skip(1) {
        if r.avg_value.unwrap_or(f64::MIN) > peak.avg_value.unwrap_or(f64::MIN) {
            peak = r;
        }
    }

    let mut top_cities = group_means(selected, |r| r.city.as_deref());
    top_cities.truncate(top);

    Some(Kpis {
        station_count,
        mean_value,
        most_polluted: Peak {
            city: peak.city.clone(),
            station: peak.station.clone(),
            avg_value: peak.avg_value.unwrap_or_default(),
        },
        top_cities,
        state_averages: group_means(selected, |r| r.state.as_deref()),
    })
}

/// Mean `avg_value` per group, highest first; rows without a group are skipped.
fn group_means<F>(rows: &[&Reading], key: F) -> Vec<GroupAverage>
where
    F: Fn(&Reading) -> Option<&str>,
{
    let mut groups: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let (Some(name), Some(value)) = (key(*row), row.avg_value) {
            let entry = groups.entry(name).or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut means: Vec<GroupAverage> = groups
        .into_iter()
        .map(|(name, (sum, count))| GroupAverage {
            name: name.to_string(),
            avg_value: sum / count as f64,
        })
        .collect();
    means.sort_by(|a, b| b.avg_value.total_cmp(&a.avg_value));
    means
}

fn serialize_iso<S: Serializer>(
    value: &Option<PrimitiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(ts) => serializer.serialize_some(&format_iso(*ts)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn reading(
        station: &str,
        city: &str,
        state: &str,
        pollutant: Pollutant,
        avg: Option<f64>,
    ) -> Reading {
        Reading {
            station: Some(station.to_string()),
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            pollutant: Some(pollutant),
            avg_value: avg,
            latitude: Some(20.0),
            longitude: Some(80.0),
            last_update: Some(datetime!(2024-01-01 10:00:00)),
            ..Default::default()
        }
    }

    fn sample() -> Vec<Reading> {
        let mut late = reading("S5", "Agra", "uttar pradesh", Pollutant::No2, Some(30.0));
        late.last_update = Some(datetime!(2024-01-02 08:00:00));

        vec![
            reading("S1", "delhi", "Delhi", Pollutant::Pm25, Some(120.0)),
            reading("S2", "Delhi", "delhi ", Pollutant::Pm25, Some(80.0)),
            reading("S3", "Patna", "Bihar", Pollutant::Pm25, Some(150.0)),
            reading("S4", "Lucknow", "Uttar Pradesh", Pollutant::Pm25, Some(60.0)),
            reading("S4", "Lucknow", "Uttar Pradesh", Pollutant::Pm25, None),
            late,
        ]
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("delhi"), "Delhi");
        assert_eq!(title_case("TAMIL NADU"), "Tamil Nadu");
        assert_eq!(title_case(" andhra  pradesh"), "Andhra  Pradesh");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_clean_drops_unplottable() {
        let mut no_coords = reading("X", "A", "B", Pollutant::Pm25, Some(1.0));
        no_coords.latitude = None;
        let cleaned = clean(vec![no_coords, reading("Y", "a", "b", Pollutant::Pm25, Some(1.0))]);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].city.as_deref(), Some("A"));
        assert_eq!(cleaned[0].state.as_deref(), Some("B"));
    }

    #[test]
    fn test_default_pollutant_kpis() {
        let summary = summarize(sample(), &SummaryOptions::default());

        assert_eq!(summary.pollutant, Some(Pollutant::Pm25));
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.latest_update, Some(datetime!(2024-01-02 08:00:00)));
        assert_eq!(summary.available_pollutants, vec!["NO2", "PM2.5"]);
        assert_eq!(
            summary.available_states,
            vec!["Bihar", "Delhi", "Uttar Pradesh"]
        );

        let kpis = summary.kpis.unwrap();
        assert_eq!(kpis.station_count, 4);
        assert!((kpis.mean_value - 102.5).abs() < 1e-9);
        assert_eq!(kpis.most_polluted.city.as_deref(), Some("Patna"));
        assert_eq!(kpis.most_polluted.avg_value, 150.0);

        let cities: Vec<_> = kpis.top_cities.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(cities, vec!["Patna", "Delhi", "Lucknow"]);
        assert!((kpis.top_cities[1].avg_value - 100.0).abs() < 1e-9);

        let states: Vec<_> = kpis.state_averages.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(states, vec!["Bihar", "Delhi", "Uttar Pradesh"]);
    }

    #[test]
    fn test_state_filter_and_top() {
        let options = SummaryOptions {
            states: vec!["delhi".to_string(), "Uttar Pradesh".to_string()],
            top: 1,
            ..Default::default()
        };
        let summary = summarize(sample(), &options);

        assert_eq!(summary.rows, 3);
        let kpis = summary.kpis.unwrap();
        assert_eq!(kpis.top_cities.len(), 1);
        assert_eq!(kpis.top_cities[0].name, "Delhi");
        assert_eq!(kpis.state_averages.len(), 2);
    }

    #[test]
    fn test_explicit_pollutant() {
        let options = SummaryOptions {
            pollutant: Some(Pollutant::No2),
            ..Default::default()
        };
        let summary = summarize(sample(), &options);
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.kpis.unwrap().most_polluted.city.as_deref(), Some("Agra"));
    }

    #[test]
    fn test_falls_back_to_first_pollutant() {
        let data = vec![
            reading("S1", "A", "X", Pollutant::So2, Some(5.0)),
            reading("S2", "B", "X", Pollutant::Co, Some(7.0)),
        ];
        let summary = summarize(data, &SummaryOptions::default());
        assert_eq!(summary.pollutant, Some(Pollutant::Co));
    }

    #[test]
    fn test_empty_selection_has_no_kpis() {
        let options = SummaryOptions {
            states: vec!["Kerala".to_string()],
            ..Default::default()
        };
        let summary = summarize(sample(), &options);
        assert_eq!(summary.rows, 0);
        assert!(summary.kpis.is_none());

        let empty = summarize(Vec::new(), &SummaryOptions::default());
        assert!(empty.pollutant.is_none());
        assert!(empty.latest_update.is_none());
        assert!(empty.kpis.is_none());
    }

    #[test]
    fn test_summary_json() {
        let summary = summarize(sample(), &SummaryOptions::default());
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["pollutant"], "PM2.5");
        assert_eq!(value["latest_update"], "2024-01-02T08:00:00");
        assert_eq!(value["kpis"]["station_count"], 4);
    }
}
