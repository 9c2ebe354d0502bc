//! Config command - inspect and create the configuration file.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::{Config, default_config_path};

/// Execute the config command.
pub fn cmd_config(action: ConfigAction, path: Option<&Path>, config: &Config) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&config.redacted())
                .context("Failed to serialize configuration")?;
            print!("{}", content);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists at {} (use --force to replace it)",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            println!("Created config file: {}", path.display());
        }
    }

    Ok(())
}
