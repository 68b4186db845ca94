//! `jobtrail mark-spam`: false-positive feedback on a conversation.

use serde_json::json;
use std::path::PathBuf;

use crate::error::JobError;
use crate::output::{self, OutputFormat};
use crate::tracker::Learner;

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    identifier: &str,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let learner = Learner::new(db);
    let (conv, feedback) = learner.mark_spam(identifier)?;

    if output == OutputFormat::Json {
        return output::json(&json!({
            "conversation_id": conv.id,
            "company": conv.company,
            "domain": feedback.domain,
            "false_positive_count": feedback.false_positive_count,
            "auto_blacklisted": feedback.auto_blacklisted,
            "archived": true,
        }));
    }

    println!("Marked as spam: {}", conv.company);
    if !feedback.domain.is_empty() {
        println!(
            "  Domain: {} (false positive count: {})",
            feedback.domain, feedback.false_positive_count
        );
        if feedback.auto_blacklisted {
            println!("  Domain auto-blacklisted (reached threshold)");
        }
    }
    println!("  Conversation archived");
    println!("\nEmails from this domain will be excluded in future syncs.");
    Ok(())
}
