//! `jobtrail sync`: fetch, filter, classify, and track.

use std::path::PathBuf;
use std::sync::Arc;

use crate::classifier::ClassifierClient;
use crate::error::JobError;
use crate::filter::Filter;
use crate::output::{self, OutputFormat};
use crate::provider;
use crate::tracker::{SyncOptions, Tracker};

use super::terminal::ProgressRenderer;

pub async fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    days: Option<String>,
    full: bool,
    no_classify: bool,
    background: bool,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    config.ensure_directories()?;
    let db = super::open_database(&config)?;
    let cancel = super::cancel_on_ctrl_c();

    let days = days.map(|d| super::parse_duration_days(&d)).transpose()?;

    let mut provider = provider::create(&config)?;
    eprintln!("Authenticating with {}...", provider.name());
    provider.authenticate(&cancel).await?;
    let user_email = provider.user_email()?;
    eprintln!("Authenticated as: {}", user_email);

    let filter = Filter::new(config.filters.clone());

    let classifier = if no_classify {
        eprintln!("Classification service: skipped (--no-classify)");
        None
    } else {
        let url = config.classifier_url();
        let mut client = ClassifierClient::new(&url)?;
        client.set_cache_enabled(config.classifier.cache_enabled);
        client.set_min_confidence(config.classifier.min_confidence);

        if client.is_running().await {
            eprintln!("Classification service: connected ({})", url);
            Some(client)
        } else {
            eprintln!("Classification service: not running (filter layers only)");
            None
        }
    };

    let mut tracker = Tracker::new(db, provider, filter, classifier, config)?;

    let renderer = Arc::new(ProgressRenderer::new());
    let progress_renderer = Arc::clone(&renderer);

    let opts = SyncOptions {
        days,
        full_sync: full,
        skip_classification: no_classify,
        background_classify: background,
        progress: Some(Arc::new(move |p| progress_renderer.update(p))),
    };

    match days {
        Some(d) => eprintln!("\nSyncing emails (last {} days)...", d),
        None if full => eprintln!("\nSyncing emails (full sync)..."),
        None => eprintln!("\nSyncing emails..."),
    }

    let result = tracker.sync(opts, &cancel).await?;
    renderer.finish();

    if output == OutputFormat::Json {
        return output::json(&result);
    }

    println!();
    println!("Sync complete:");
    println!("  Fetched:        {}", result.emails_fetched);
    println!("  Job-related:    {}", result.emails_filtered);
    if result.emails_classified > 0 {
        println!("  LLM-classified: {}", result.emails_classified);
    }
    if result.classification_skipped {
        println!("  Pending LLM:    {}", result.emails_pending_classify);
    }
    println!("  New threads:    {}", result.conversations_new);
    println!("  Updated:        {}", result.conversations_updated);

    if !result.warnings.is_empty() {
        println!("\nWarnings ({}):", result.warnings.len());
        for w in &result.warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}
