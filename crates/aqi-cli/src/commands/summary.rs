//! Summary command - dashboard KPIs over the store.

use anyhow::Result;

use aqi_core::{SummaryOptions, summarize};
use aqi_store::ReadingQuery;

use crate::cli::{FilterArgs, OutputFormat, SourceArgs};
use crate::commands::{open_source, resolve_source};
use crate::config::Config;
use crate::format::{FormatOptions, format_summary_text};

/// Execute the summary command.
pub fn cmd_summary(
    source: &SourceArgs,
    filter: FilterArgs,
    top: usize,
    format: OutputFormat,
    config: &Config,
    opts: &FormatOptions,
) -> Result<()> {
    let target = resolve_source(source, config);
    let store = open_source(&target)?;
    let readings = store.query(&ReadingQuery::new().oldest_first())?;

    let options = SummaryOptions {
        pollutant: filter.pollutant,
        states: filter.state,
        top,
    };
    let summary = summarize(readings, &options);

    let content = match format {
        OutputFormat::Json => opts.as_json(&summary)?,
        OutputFormat::Text | OutputFormat::Csv => format_summary_text(&summary, opts),
    };
    print!("{}", content);

    Ok(())
}
