//! `jobtrail filters`: inspect and curate learned rules.

use clap::Subcommand;
use std::path::PathBuf;

use crate::db::models::FilterSource;
use crate::error::JobError;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum FiltersAction {
    /// List learned filter rules
    List {
        /// Only AI suggestions awaiting review
        #[arg(long)]
        suggested: bool,
    },
    /// Approve an AI-suggested rule so it takes effect
    Approve { id: String },
    /// Reject and delete a rule
    Reject { id: String },
    /// Dump all rules as JSON
    Export,
}

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    action: FiltersAction,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    match action {
        FiltersAction::List { suggested } => {
            let source = suggested.then_some(FilterSource::AiSuggested);
            let filters = db.list_learned_filters(source)?;

            if output == OutputFormat::Json {
                return output::json(&filters);
            }

            if filters.is_empty() {
                println!("No learned filters yet.");
                return Ok(());
            }

            for f in &filters {
                let mut flags = vec![f.source.as_str().to_string()];
                if f.false_positive_count > 0 {
                    flags.push(format!("fp:{}", f.false_positive_count));
                }
                if f.auto_blacklisted {
                    flags.push("auto-blacklisted".into());
                }
                println!(
                    "{}  {:<18} {:<30} [{}]",
                    f.id,
                    f.filter_type.as_str(),
                    f.value,
                    flags.join(", ")
                );
            }
            Ok(())
        }
        FiltersAction::Approve { id } => {
            db.approve_learned_filter(&id)?;
            println!("Approved. The rule now applies to future syncs.");
            Ok(())
        }
        FiltersAction::Reject { id } => {
            db.delete_learned_filter(&id)?;
            println!("Deleted.");
            Ok(())
        }
        FiltersAction::Export => {
            let filters = db.list_learned_filters(None)?;
            output::json(&filters)
        }
    }
}
