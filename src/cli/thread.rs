//! `jobtrail thread`: the full thread with bodies fetched live.

use std::io::stdout;
use std::path::PathBuf;

use crate::error::JobError;
use crate::filter::Filter;
use crate::output::{self, OutputFormat};
use crate::provider;
use crate::tracker::Tracker;

pub async fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    identifier: &str,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;
    let cancel = super::cancel_on_ctrl_c();

    // Bodies come from the provider, so this command authenticates.
    let mut provider = provider::create(&config)?;
    provider.authenticate(&cancel).await?;

    let filter = Filter::new(config.filters.clone());
    let tracker = Tracker::new(db, provider, filter, None, config)?;

    let thread = tracker.fetch_thread(identifier).await?;

    match output {
        OutputFormat::Json => output::json(&thread),
        OutputFormat::Table => output::thread_detail(&mut stdout(), &thread),
    }
}
