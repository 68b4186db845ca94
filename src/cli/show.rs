//! `jobtrail show`: one conversation with its timeline.

use serde_json::json;
use std::io::stdout;
use std::path::PathBuf;

use crate::error::JobError;
use crate::output::{self, OutputFormat};

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    identifier: &str,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let conv = super::find_conversation(&db, identifier)?;
    let emails = db.list_emails_for_conversation(&conv.id)?;

    match output {
        OutputFormat::Json => output::json(&json!({ "conversation": conv, "emails": emails })),
        OutputFormat::Table => output::conversation_detail(&mut stdout(), &conv, &emails),
    }
}
