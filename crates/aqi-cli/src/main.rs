//! `aqi` - fetch, store and summarize India air-quality readings.

mod cli;
mod commands;
mod config;
mod format;

use std::io;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{FetchArgs, ReadingsArgs, cmd_config, cmd_fetch, cmd_readings, cmd_summary};
use config::Config;
use format::FormatOptions;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "aqi", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Logs share stdout with text output; JSON and CSV output keeps stdout to itself
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!cli.no_color);
    if cli.command.has_structured_output() {
        subscriber.with_writer(io::stderr).init();
    } else {
        subscriber.init();
    }

    // `config init` may point at a file that does not exist yet
    let config = match (&cli.command, cli.config.as_deref()) {
        (Commands::Config { .. }, Some(path)) if !path.exists() => Config::default(),
        (_, path) => Config::load_from(path).context("Failed to load config")?,
    };
    let opts = FormatOptions::new(cli.no_color);

    match cli.command {
        Commands::Fetch {
            store,
            url,
            api_key,
            limit,
            format,
        } => {
            let config = config.with_api_url(url.clone());
            config.validate()?;
            let code = cmd_fetch(
                FetchArgs {
                    store,
                    url,
                    api_key,
                    limit,
                    format,
                },
                &config,
                &opts,
            )
            .await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Summary {
            source,
            filter,
            top,
            format,
        } => cmd_summary(&source, filter, top, format, &config, &opts)?,
        Commands::Readings {
            source,
            filter,
            city,
            station,
            since,
            until,
            limit,
            oldest_first,
            format,
        } => cmd_readings(
            ReadingsArgs {
                source,
                filter,
                city,
                station,
                since,
                until,
                limit,
                oldest_first,
                format,
            },
            &config,
            &opts,
        )?,
        Commands::Config { action } => cmd_config(action, cli.config.as_deref(), &config)?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
