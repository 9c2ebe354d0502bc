//! Command implementations for the CLI.

mod config;
mod fetch;
mod readings;
mod summary;

pub use config::cmd_config;
pub use fetch::{FetchArgs, cmd_fetch};
pub use readings::{ReadingsArgs, cmd_readings};
pub use summary::cmd_summary;

use anyhow::{Context, Result};

use aqi_core::StoreTarget;
use aqi_store::ReadingStore;

use crate::cli::SourceArgs;
use crate::config::Config;

/// Resolve where readings are read from: explicit flags override config.
pub(crate) fn resolve_source(source: &SourceArgs, config: &Config) -> StoreTarget {
    let mode = source.mode.unwrap_or(config.storage.mode);
    config.storage.target(
        mode,
        source.path.clone(),
        source.table.clone(),
        config.storage.overwrite,
    )
}

/// Open a store that must already exist.
pub(crate) fn open_source(target: &StoreTarget) -> Result<Box<dyn ReadingStore>> {
    target.open_existing().with_context(|| {
        format!(
            "Failed to open {}. Run 'aqi fetch' to collect readings first",
            target
        )
    })
}
