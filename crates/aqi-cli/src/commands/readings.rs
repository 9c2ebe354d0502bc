//! Readings command - list stored readings.

use anyhow::Result;
use time::PrimitiveDateTime;

use aqi_store::ReadingQuery;

use crate::cli::{FilterArgs, OutputFormat, SourceArgs};
use crate::commands::{open_source, resolve_source};
use crate::config::Config;
use crate::format::{FormatOptions, format_readings_csv, format_readings_text};

/// Arguments for the readings command.
pub struct ReadingsArgs {
    pub source: SourceArgs,
    pub filter: FilterArgs,
    pub city: Option<String>,
    pub station: Option<String>,
    pub since: Option<PrimitiveDateTime>,
    pub until: Option<PrimitiveDateTime>,
    pub limit: u32,
    pub oldest_first: bool,
    pub format: OutputFormat,
}

impl ReadingsArgs {
    fn query(&self) -> ReadingQuery {
        let mut query = ReadingQuery::new().states(self.filter.state.iter());

        if let Some(pollutant) = &self.filter.pollutant {
            query = query.pollutant(pollutant.clone());
        }
        if let Some(city) = &self.city {
            query = query.city(city);
        }
        if let Some(station) = &self.station {
            query = query.station(station);
        }
        if let Some(since) = self.since {
            query = query.since(since);
        }
        if let Some(until) = self.until {
            query = query.until(until);
        }
        if self.limit > 0 {
            query = query.limit(self.limit);
        }
        if self.oldest_first {
            query = query.oldest_first();
        }

        query
    }
}

/// Execute the readings command.
pub fn cmd_readings(args: ReadingsArgs, config: &Config, opts: &FormatOptions) -> Result<()> {
    let target = resolve_source(&args.source, config);
    let store = open_source(&target)?;
    let readings = store.query(&args.query())?;

    let content = match args.format {
        OutputFormat::Json => opts.as_json(&readings)?,
        OutputFormat::Csv => format_readings_csv(&readings),
        OutputFormat::Text => format_readings_text(&readings, opts),
    };
    print!("{}", content);

    Ok(())
}
