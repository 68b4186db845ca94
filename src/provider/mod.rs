//! Email provider abstraction
//!
//! A provider is a small capability set, not a hierarchy: authenticate,
//! list/fetch, fetch-one, whoami. Gmail is the only variant today;
//! dispatch is by the provider name in config so outlook/imap can slot in
//! later.

pub mod gmail;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::JobError;
use crate::types::EmailMessage;

/// Reported during fetch: (phase, current, total). Phases are "listing"
/// and "fetching". Callbacks may fire from concurrent tasks.
pub type FetchProgress = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Options for a fetch run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_results: usize,
    /// Only messages after this instant; `None` means no date clause.
    pub after: Option<DateTime<Utc>>,
    /// Extra provider-specific query clause.
    pub query: String,
    /// Also pull the sent folder so outbound replies are captured.
    pub include_sent: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_results: 100,
            after: Some(Utc::now() - Duration::days(30)),
            query: String::new(),
            include_sent: true,
        }
    }
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Provider identifier ("gmail", ...).
    fn name(&self) -> &'static str;

    /// Idempotent; may suspend for an interactive browser flow.
    async fn authenticate(&mut self, cancel: &CancellationToken) -> Result<(), JobError>;

    /// Whether usable credentials exist without going interactive.
    fn is_authenticated(&self) -> bool;

    /// Address of the account owner.
    fn user_email(&self) -> Result<String, JobError>;

    /// List matching message ids, then fetch full content. Individual
    /// fetch failures are logged and omitted; only a failed list phase is
    /// an error.
    async fn fetch(
        &self,
        opts: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<EmailMessage>, JobError>;

    /// Fetch one message with full body.
    async fn get_message(&self, id: &str) -> Result<EmailMessage, JobError>;

    fn set_progress_callback(&mut self, callback: FetchProgress);
}

/// Build the provider named in config.
pub fn create(config: &Config) -> Result<Box<dyn EmailProvider>, JobError> {
    // Only one variant exists; the config section doubles as the selector.
    Ok(Box::new(gmail::GmailProvider::new(
        &config.gmail.credentials_path,
        &config.gmail.token_path,
    )))
}
