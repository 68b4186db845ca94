//! Output formatting: aligned tables for humans, JSON for scripts, CSV
//! for export.

mod csv_export;
mod table;

pub use csv_export::write_conversations_csv;
pub use table::{
    conversation_detail, conversations_table, stats_table, thread_detail, truncate,
};

use serde::Serialize;

use crate::error::JobError;

/// Print a value as pretty JSON to stdout.
pub fn json<T: Serialize>(value: &T) -> Result<(), JobError> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

/// Output format selected with `-o`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
