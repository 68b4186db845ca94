//! `jobtrail feedback`: tell the filter where it went wrong.

use clap::Subcommand;
use std::path::PathBuf;

use crate::error::JobError;
use crate::output::OutputFormat;
use crate::tracker::Learner;

#[derive(Subcommand)]
pub enum FeedbackAction {
    /// A tracked conversation is not actually job-related
    #[command(name = "false-positive")]
    FalsePositive {
        /// Company name or conversation id
        identifier: String,
    },
    /// A job-related email was wrongly excluded
    #[command(name = "false-negative")]
    FalseNegative {
        /// Sender address of the missed email
        from: String,
    },
}

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    action: FeedbackAction,
) -> Result<(), JobError> {
    match action {
        FeedbackAction::FalsePositive { identifier } => {
            // Same path as mark-spam.
            super::markspam::run(config_path, output, &identifier)
        }
        FeedbackAction::FalseNegative { from } => {
            let config = super::load_config(config_path)?;
            let db = super::open_database(&config)?;

            let learner = Learner::new(db);
            learner.record_false_negative(&from)?;

            println!("Recorded. {}'s domain is now whitelisted for future syncs.", from);
            Ok(())
        }
    }
}
