//! Fetch command - one fetch-and-ingest run.

use anyhow::{Context, Result};
use tracing::debug;

use aqi_core::fetch::DEFAULT_TIMEOUT;
use aqi_core::{Fetcher, Ingestor, run};

use crate::cli::{OutputFormat, StoreArgs};
use crate::config::Config;
use crate::format::{FormatOptions, format_run_text};

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub store: StoreArgs,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub limit: Option<u32>,
    pub format: OutputFormat,
}

/// Execute the fetch command and return the process exit status.
pub async fn cmd_fetch(args: FetchArgs, config: &Config, opts: &FormatOptions) -> Result<i32> {
    let url = args.url.unwrap_or_else(|| config.api.url.clone());
    let api_key = args
        .api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| config.api.key.clone());

    let mut fetcher = Fetcher::new(&url, api_key).context("Invalid API URL")?;
    if let Some(limit) = args.limit {
        fetcher = fetcher.with_limit(limit);
    }

    let mode = args.store.source.mode.unwrap_or(config.storage.mode);
    let target = config.storage.target(
        mode,
        args.store.source.path.clone(),
        args.store.source.table.clone(),
        args.store.resolve_overwrite(config.storage.overwrite),
    );
    let dedup = args.store.dedup.unwrap_or(config.storage.dedup);
    debug!(
        "Fetching into {} (dedup: {}, timeout: {}s)",
        target,
        dedup,
        DEFAULT_TIMEOUT.as_secs()
    );

    let ingestor = Ingestor::new(target.clone()).with_dedup(dedup);
    let report = run(&fetcher, &ingestor).await;

    let content = match args.format {
        OutputFormat::Json => opts.as_json(&report)?,
        OutputFormat::Text | OutputFormat::Csv => format_run_text(&report, &target, opts),
    };
    print!("{}", content);

    Ok(report.exit_code())
}
