//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use time::macros::format_description;

use aqi_store::DedupPolicy;
use aqi_types::Pollutant;
use aqi_types::schema::{parse_iso, parse_last_update};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Flat CSV file
    #[default]
    Csv,
    /// Table in a SQLite database
    Sqlite,
}

/// Reusable arguments selecting where readings live
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Storage backend (overrides config)
    #[arg(short, long, value_enum)]
    pub mode: Option<StorageMode>,

    /// Path of the CSV file or SQLite database (overrides config)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// SQLite table name (overrides config)
    #[arg(long)]
    pub table: Option<String>,
}

/// Store arguments for writing commands
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Rewrite the CSV file with each batch (overrides config)
    #[arg(long, conflicts_with = "append")]
    pub overwrite: bool,

    /// Append to the CSV file instead of rewriting it (overrides config)
    #[arg(long, conflicts_with = "overwrite")]
    pub append: bool,

    /// What to do with readings already stored (keep-all, skip-existing)
    #[arg(long)]
    pub dedup: Option<DedupPolicy>,
}

impl StoreArgs {
    /// Resolve overwrite setting: explicit flags override config
    pub fn resolve_overwrite(&self, config_overwrite: bool) -> bool {
        if self.overwrite {
            true
        } else if self.append {
            false
        } else {
            config_overwrite
        }
    }
}

/// Reading filters shared by `summary` and `readings`
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Pollutant code (e.g. PM2.5, PM10, NO2)
    #[arg(long, value_parser = parse_pollutant)]
    pub pollutant: Option<Pollutant>,

    /// State(s) to include - can be specified multiple times, or comma-separated
    #[arg(long, value_delimiter = ',')]
    pub state: Vec<String>,
}

#[derive(Parser)]
#[command(name = "aqi")]
#[command(author, version, about = "Fetch, store and summarize India air-quality readings", long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/aqi/config.toml)
    #[arg(long, global = true, env = "AQI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one batch from the API and append it to the store
    Fetch {
        #[command(flatten)]
        store: StoreArgs,

        /// API resource URL (overrides config)
        #[arg(long)]
        url: Option<String>,

        /// API key, or use DATA_GOV_API_KEY env var
        #[arg(long, env = "DATA_GOV_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Records requested per call
        #[arg(long)]
        limit: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show dashboard KPIs for stored readings
    Summary {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Number of cities in the ranking
        #[arg(long, default_value = "10")]
        top: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored readings
    Readings {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Only readings from this city
        #[arg(long)]
        city: Option<String>,

        /// Only readings from this station
        #[arg(long)]
        station: Option<String>,

        /// Readings updated at or after (YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or DD-MM-YYYY HH:MM:SS)
        #[arg(long, value_parser = parse_datetime)]
        since: Option<PrimitiveDateTime>,

        /// Readings updated at or before (same formats as --since)
        #[arg(long, value_parser = parse_datetime)]
        until: Option<PrimitiveDateTime>,

        /// Maximum number of readings (0 for all)
        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,

        /// Oldest readings first
        #[arg(long)]
        oldest_first: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    /// Returns true when the command writes JSON or CSV to stdout.
    pub fn has_structured_output(&self) -> bool {
        match self {
            Commands::Fetch { format, .. }
            | Commands::Summary { format, .. }
            | Commands::Readings { format, .. } => *format != OutputFormat::Text,
            Commands::Config { .. } | Commands::Completions { .. } => false,
        }
    }
}

/// Configuration subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse a pollutant code, rejecting blanks
fn parse_pollutant(s: &str) -> Result<Pollutant, String> {
    if s.trim().is_empty() {
        return Err("pollutant code cannot be empty".to_string());
    }
    Ok(Pollutant::from(s))
}

/// Parse a date or date-time in any of the accepted shapes
pub fn parse_datetime(s: &str) -> Result<PrimitiveDateTime, String> {
    if let Some(ts) = parse_iso(s).or_else(|| parse_last_update(s)) {
        return Ok(ts);
    }

    time::Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map(|date| date.midnight())
        .map_err(|_| {
            format!(
                "Invalid date '{}'. Use YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or DD-MM-YYYY HH:MM:SS",
                s
            )
        })
}
