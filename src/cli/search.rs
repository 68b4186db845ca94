//! `jobtrail search`: free-text search across conversations.

use std::io::stdout;
use std::path::PathBuf;

use crate::error::JobError;
use crate::output::{self, OutputFormat};

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    query: &str,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let convs = db.search_conversations(query)?;

    match output {
        OutputFormat::Json => output::json(&convs),
        OutputFormat::Table => {
            if convs.is_empty() {
                println!("No matches for {:?}.", query);
                return Ok(());
            }
            output::conversations_table(&mut stdout(), &convs)
        }
    }
}
