//! Gmail provider
//!
//! Two-phase fetch: page message ids from the list endpoint, then pull
//! full messages in parallel under a counting semaphore. Individual fetch
//! failures are logged and skipped; a failed list phase fails the run.

mod auth;
mod fetch;

pub use fetch::{build_query, convert_message};

use google_gmail1::Gmail;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{EmailProvider, FetchOptions, FetchProgress};
use crate::error::JobError;
use crate::types::EmailMessage;

/// Parallel in-flight message fetches.
const CONCURRENT_FETCHES: usize = 10;

/// Page size cap imposed by the Gmail list endpoint.
const MAX_PAGE_SIZE: usize = 500;

type GmailHub = Gmail<HttpsConnector<HttpConnector>>;

pub struct GmailProvider {
    credentials_path: String,
    token_path: String,
    hub: Option<GmailHub>,
    user_email: Option<String>,
    progress: Option<FetchProgress>,
}

impl GmailProvider {
    pub fn new(credentials_path: &str, token_path: &str) -> Self {
        Self {
            credentials_path: credentials_path.to_string(),
            token_path: token_path.to_string(),
            hub: None,
            user_email: None,
            progress: None,
        }
    }

    fn report(&self, phase: &str, current: usize, total: usize) {
        if let Some(cb) = &self.progress {
            cb(phase, current, total);
        }
    }

    fn hub(&self) -> Result<&GmailHub, JobError> {
        self.hub
            .as_ref()
            .ok_or_else(|| JobError::Auth("not authenticated - run a sync first".into()))
    }

    /// Page the list endpoint until `max_results` ids are collected or
    /// paging is exhausted.
    async fn list_message_ids(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, JobError> {
        let hub = self.hub()?;
        let mut ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;

        self.report("listing", 0, max_results);

        loop {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let page_size = (max_results - ids.len()).min(MAX_PAGE_SIZE) as u32;
            let mut req = hub
                .users()
                .messages_list("me")
                .q(query)
                .max_results(page_size);
            if let Some(token) = &page_token {
                req = req.page_token(token);
            }

            let (_, list) = req
                .doit()
                .await
                .map_err(|e| JobError::Provider(format!("failed to list messages: {}", e)))?;

            for msg in list.messages.unwrap_or_default() {
                if let Some(id) = msg.id {
                    ids.push(id);
                    if ids.len() >= max_results {
                        break;
                    }
                }
            }

            self.report("listing", ids.len(), max_results);

            page_token = list.next_page_token;
            if page_token.is_none() || ids.len() >= max_results {
                break;
            }
        }

        Ok(ids)
    }

    /// Fetch full messages for `ids`, at most [`CONCURRENT_FETCHES`] in
    /// flight. Order of the result is arbitrary; failed ids are dropped
    /// with a warning.
    async fn fetch_parallel(
        &self,
        ids: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<EmailMessage>, JobError> {
        let hub = self.hub()?;
        let total = ids.len();
        let sem = Arc::new(Semaphore::new(CONCURRENT_FETCHES));
        let fetched = AtomicUsize::new(0);

        self.report("fetching", 0, total);

        let tasks = ids.into_iter().enumerate().map(|(index, id)| {
            let sem = Arc::clone(&sem);
            let fetched = &fetched;
            async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (index, Err(JobError::Cancelled)),
                    permit = sem.acquire() => match permit {
                        Ok(p) => p,
                        Err(_) => return (index, Err(JobError::Cancelled)),
                    },
                };

                let result = hub
                    .users()
                    .messages_get("me", &id)
                    .format("full")
                    .doit()
                    .await;

                match result {
                    Ok((_, msg)) => {
                        let current = fetched.fetch_add(1, Ordering::SeqCst) + 1;
                        self.report("fetching", current, total);
                        (index, Ok(fetch::convert_message(msg)))
                    }
                    Err(e) => (index, Err(JobError::Provider(format!("message {}: {}", id, e)))),
                }
            }
        });

        let results = futures::future::join_all(tasks).await;

        let mut slots: Vec<Option<EmailMessage>> = (0..total).map(|_| None).collect();
        let mut failures = 0usize;
        let mut cancelled = false;
        for (index, result) in results {
            match result {
                Ok(email) => slots[index] = Some(email),
                Err(JobError::Cancelled) => cancelled = true,
                Err(e) => {
                    failures += 1;
                    warn!(%e, "failed to fetch message");
                }
            }
        }

        if cancelled {
            return Err(JobError::Cancelled);
        }
        if failures > 0 {
            warn!(failures, "some messages could not be fetched and were skipped");
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[async_trait::async_trait]
impl EmailProvider for GmailProvider {
    fn name(&self) -> &'static str {
        "gmail"
    }

    async fn authenticate(&mut self, cancel: &CancellationToken) -> Result<(), JobError> {
        let secret = auth::load_secret(&self.credentials_path).await?;
        let authenticator = auth::build_authenticator(secret, &self.token_path).await?;

        // First run opens a browser; bound the wait.
        let token = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            result = tokio::time::timeout(auth::AUTH_FLOW_TIMEOUT, authenticator.token(auth::SCOPES)) => {
                result.map_err(|_| JobError::Auth("authentication timed out after 5 minutes".into()))?
            }
        };
        token.map_err(|e| JobError::Auth(format!("token request failed: {}", e)))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| JobError::Auth(format!("failed to load native roots: {}", e)))?
            .https_only()
            .enable_http1()
            .build();
        let hub = Gmail::new(hyper::Client::builder().build(connector), authenticator);

        let (_, profile) = hub
            .users()
            .get_profile("me")
            .doit()
            .await
            .map_err(|e| JobError::Auth(format!("failed to get user profile: {}", e)))?;

        self.user_email = profile.email_address;
        self.hub = Some(hub);
        debug!(user = ?self.user_email, "gmail authenticated");
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.hub.is_some() || auth::has_cached_token(&self.token_path)
    }

    fn user_email(&self) -> Result<String, JobError> {
        self.user_email
            .clone()
            .ok_or_else(|| JobError::Auth("not authenticated".into()))
    }

    async fn fetch(
        &self,
        opts: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<EmailMessage>, JobError> {
        let query = fetch::build_query(opts);
        let ids = self
            .list_message_ids(&query, opts.max_results, cancel)
            .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.fetch_parallel(ids, cancel).await
    }

    async fn get_message(&self, id: &str) -> Result<EmailMessage, JobError> {
        let hub = self.hub()?;
        let (_, msg) = hub
            .users()
            .messages_get("me", id)
            .format("full")
            .doit()
            .await
            .map_err(|e| JobError::Provider(format!("failed to get message {}: {}", id, e)))?;

        Ok(fetch::convert_message(msg))
    }

    fn set_progress_callback(&mut self, callback: FetchProgress) {
        self.progress = Some(callback);
    }
}
