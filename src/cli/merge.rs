//! `jobtrail merge`: combine two conversations.

use std::path::PathBuf;

use crate::error::JobError;
use crate::output::{self, OutputFormat};

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    target: &str,
    source: &str,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let target_conv = super::find_conversation(&db, target)?;
    let source_conv = super::find_conversation(&db, source)?;

    let result = db.merge_conversations(&target_conv.id, &source_conv.id)?;

    if output == OutputFormat::Json {
        return output::json(&result);
    }

    println!("Merged conversations:");
    println!("  From: {} ({})", source_conv.company, source_conv.id);
    println!("  Into: {} ({})", target_conv.company, target_conv.id);
    println!("  Emails moved: {}", result.emails_moved);
    println!("  New total:    {}", result.total_emails);
    Ok(())
}
