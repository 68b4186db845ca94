//! `jobtrail config`: init and show.

use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::JobError;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented default config file
    Init,
    /// Print the effective configuration
    Show,
}

pub fn run(config_path: &Option<PathBuf>, action: ConfigAction) -> Result<(), JobError> {
    match action {
        ConfigAction::Init => {
            let target = config_path
                .clone()
                .unwrap_or_else(Config::default_path);
            let written = Config::init_at(&target)?;
            println!("Wrote config to {}", written.display());
            println!("Edit it, then run 'jobtrail sync'.");
            Ok(())
        }
        ConfigAction::Show => {
            let config = super::load_config(config_path)?;
            let text = toml::to_string_pretty(&config)
                .map_err(|e| JobError::Config(e.to_string()))?;
            println!("{text}");
            Ok(())
        }
    }
}
