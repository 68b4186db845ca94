//! `jobtrail export`: dump conversations to CSV or JSON on stdout.

use clap::ValueEnum;
use std::io::stdout;
use std::path::PathBuf;

use crate::db::models::ListOptions;
use crate::error::JobError;
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

pub fn run(
    config_path: &Option<PathBuf>,
    format: ExportFormat,
    include_archived: bool,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let convs = db.list_conversations(&ListOptions {
        include_archived,
        ..Default::default()
    })?;

    match format {
        ExportFormat::Json => output::json(&convs),
        ExportFormat::Csv => output::write_conversations_csv(stdout(), &convs),
    }
}
