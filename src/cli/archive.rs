//! `jobtrail archive` / `unarchive`.

use std::path::PathBuf;

use crate::error::JobError;
use crate::output::{self, OutputFormat};

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    identifier: &str,
    unarchive: bool,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let conv = super::find_conversation(&db, identifier)?;
    let result = if unarchive {
        db.unarchive_conversation(&conv.id)?
    } else {
        db.archive_conversation(&conv.id)?
    };

    if output == OutputFormat::Json {
        return output::json(&result);
    }

    if result.archived {
        println!("Archived: {} ({})", result.company, result.conversation_id);
        println!("Use 'jobtrail list --include-archived' to see archived conversations.");
    } else {
        println!("Unarchived: {} ({})", result.company, result.conversation_id);
    }
    Ok(())
}
