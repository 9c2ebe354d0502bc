//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use owo_colors::OwoColorize;
use time::PrimitiveDateTime;
use time::macros::format_description;

use aqi_core::summary::{GroupAverage, Summary};
use aqi_core::{RunOutcome, RunReport, StoreTarget};
use aqi_types::Reading;
use aqi_types::schema::{COLUMNS, format_last_update};

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    /// Serialize value to a pretty JSON string.
    pub fn as_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)? + "\n")
    }

    fn good(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.green().to_string()
        }
    }

    fn bad(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.red().to_string()
        }
    }

    fn warn(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.yellow().to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }
}

/// Escape a CSV field
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Dashboard-style timestamp, e.g. `January 01, 2024 at 10:00 AM`.
#[must_use]
pub fn format_updated(ts: PrimitiveDateTime) -> String {
    ts.format(format_description!(
        "[month repr:long] [day], [year] at [hour repr:12]:[minute] [period]"
    ))
    .unwrap_or_default()
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string())
}

fn text_or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Format the result of one fetch-and-ingest run.
#[must_use]
pub fn format_run_text(report: &RunReport, target: &StoreTarget, opts: &FormatOptions) -> String {
    let mut output = String::new();

    match &report.outcome {
        RunOutcome::Done(result) => {
            output.push_str(&format!(
                "{} {} of {} readings to {}\n",
                opts.good("Saved"),
                result.rows_written,
                result.rows_received,
                target
            ));
            if result.rows_skipped > 0 {
                output.push_str(&format!(
                    "  Skipped:  {} already stored\n",
                    result.rows_skipped
                ));
            }
            if !result.ignored_fields.is_empty() {
                output.push_str(&format!(
                    "  {} {}\n",
                    opts.dim("Ignored fields:"),
                    result.ignored_fields.join(", ")
                ));
            }
            if !result.missing_fields.is_empty() {
                output.push_str(&format!(
                    "  {} {}\n",
                    opts.dim("Missing fields:"),
                    result.missing_fields.join(", ")
                ));
            }
        }
        RunOutcome::NoData => {
            output.push_str(&format!(
                "{} the API returned no records; {} was not modified\n",
                opts.warn("No data:"),
                target
            ));
        }
        RunOutcome::FetchFailed { message } => {
            output.push_str(&format!("{} {}\n", opts.bad("Fetch failed:"), message));
        }
        RunOutcome::IngestFailed { message } => {
            output.push_str(&format!("{} {}\n", opts.bad("Ingest failed:"), message));
        }
    }

    output
}

fn push_ranking(output: &mut String, title: &str, groups: &[GroupAverage]) {
    if groups.is_empty() {
        return;
    }
    output.push_str(&format!("\n{}\n", title));
    let width = groups.iter().map(|g| g.name.len()).max().unwrap_or(0);
    for (i, group) in groups.iter().enumerate() {
        output.push_str(&format!(
            "  {:>2}. {:<width$}  {:.1}\n",
            i + 1,
            group.name,
            group.avg_value,
            width = width
        ));
    }
}

/// Format the dashboard summary.
#[must_use]
pub fn format_summary_text(summary: &Summary, opts: &FormatOptions) -> String {
    let mut output = String::new();

    let pollutant = summary
        .pollutant
        .as_ref()
        .map(|p| p.code().to_string())
        .unwrap_or_else(|| "-".to_string());
    output.push_str(&format!("Air Quality Summary: {}\n", pollutant));

    if let Some(updated) = summary.latest_update {
        output.push_str(&format!(
            "{}\n",
            opts.dim(&format!("Last updated: {}", format_updated(updated)))
        ));
    }
    if !summary.states.is_empty() {
        output.push_str(&format!("States: {}\n", summary.states.join(", ")));
    }

    let Some(kpis) = &summary.kpis else {
        output.push_str(&format!(
            "\n{}\n",
            opts.warn("No data available for the selected filters.")
        ));
        return output;
    };

    output.push_str(&format!("\n  Stations:       {}\n", kpis.station_count));
    output.push_str(&format!("  Average level:  {:.1}\n", kpis.mean_value));

    let peak = &kpis.most_polluted;
    let place = match (&peak.city, &peak.station) {
        (Some(city), Some(station)) => format!("{} ({})", city, station),
        (Some(city), None) => city.clone(),
        (None, Some(station)) => station.clone(),
        (None, None) => "-".to_string(),
    };
    output.push_str(&format!(
        "  Most polluted:  {} {}\n",
        place,
        opts.bad(&format!("{:.1}", peak.avg_value))
    ));

    push_ranking(
        &mut output,
        &format!("Top {} cities", kpis.top_cities.len()),
        &kpis.top_cities,
    );
    push_ranking(&mut output, "State averages", &kpis.state_averages);

    output
}

/// Format readings as an aligned table.
#[must_use]
pub fn format_readings_text(readings: &[Reading], opts: &FormatOptions) -> String {
    if readings.is_empty() {
        return "No readings found.\n".to_string();
    }

    let mut output = format!(
        "{:<19}  {:<16}  {:<16}  {:<28}  {:<8}  {:>7}  {:>7}  {:>7}\n",
        "Last update", "State", "City", "Station", "Pollut.", "Min", "Max", "Avg"
    );
    output.push_str(&opts.dim(&"-".repeat(120)));
    output.push('\n');

    for r in readings {
        let updated = r
            .last_update
            .map(format_last_update)
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:<19}  {:<16}  {:<16}  {:<28}  {:<8}  {:>7}  {:>7}  {:>7}\n",
            updated,
            text_or_dash(r.state.as_deref()),
            text_or_dash(r.city.as_deref()),
            text_or_dash(r.station.as_deref()),
            text_or_dash(r.pollutant_code()),
            format_value(r.min_value),
            format_value(r.max_value),
            format_value(r.avg_value),
        ));
    }

    output.push_str(&format!("\n{} readings\n", readings.len()));
    output
}

/// Format readings as CSV with the store's column layout.
#[must_use]
pub fn format_readings_csv(readings: &[Reading]) -> String {
    let mut output = COLUMNS.join(",");
    output.push('\n');

    let number = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    let text = |v: Option<&str>| v.map(csv_escape).unwrap_or_default();

    for r in readings {
        let fields = [
            text(r.country.as_deref()),
            text(r.state.as_deref()),
            text(r.city.as_deref()),
            text(r.station.as_deref()),
            r.last_update.map(format_last_update).unwrap_or_default(),
            number(r.latitude),
            number(r.longitude),
            text(r.pollutant_code()),
            number(r.min_value),
            number(r.max_value),
            number(r.avg_value),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}
