//! Sync pipeline
//!
//! Orchestrates one sync run: fetch from the provider, run the admission
//! filter, classify the uncertain remainder with the LLM service,
//! second-pass validate the medium-confidence verdicts, then merge
//! admitted messages into conversations and recompute statuses. Stages
//! run in order; inside a stage, work fans out under the stage's
//! concurrency bound. Partial failure is the norm: per-item errors become
//! warnings and the run keeps going.

mod learner;
mod progress;
mod status;
mod thread;

pub use learner::{Learner, SpamFeedback};
pub use progress::{Phase, Progress, ProgressCallback};
pub use status::{
    compute_status, last_activity_summary, response_time_days, response_time_days_by_direction,
};
pub use thread::{Thread, ThreadEmail};

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::{
    BatchClassifyResult, BatchEmailItem, ClassifierClient, ClassifyRequest, ClassifyResponse,
    ValidateRequest,
};
use crate::config::Config;
use crate::crypto::BodyCipher;
use crate::db::models::{Conversation, ConversationStatus, Direction, Email, ListOptions};
use crate::db::{Database, MetricField};
use crate::error::JobError;
use crate::filter::{self, Filter, FilteredEmail, Layer, LearnedRules};
use crate::provider::{EmailProvider, FetchOptions};
use crate::types::EmailMessage;

/// Above this confidence a verdict is accepted without validation.
const CONFIDENCE_HIGH: f64 = 0.8;
/// Verdicts in [CONFIDENCE_MEDIUM, CONFIDENCE_HIGH) get a second pass.
const CONFIDENCE_MEDIUM: f64 = 0.5;
/// Emails per call to the batch classify endpoint.
const BATCH_SIZE: usize = 5;

/// Options for one sync run.
#[derive(Default)]
pub struct SyncOptions {
    /// Fetch window in days; overrides the incremental cursor.
    pub days: Option<i64>,
    /// Ignore the cursor and use the default window.
    pub full_sync: bool,
    /// Skip LLM classification entirely.
    pub skip_classification: bool,
    /// Quick sync: defer classification, report pending count.
    pub background_classify: bool,
    pub progress: Option<ProgressCallback>,
}

/// Counters and warnings from a sync run.
#[derive(Debug, Default, Serialize)]
pub struct SyncResult {
    pub emails_fetched: usize,
    pub emails_filtered: usize,
    pub emails_classified: usize,
    pub emails_pending_classify: usize,
    pub conversations_new: usize,
    pub conversations_updated: usize,
    pub classification_skipped: bool,
    pub warnings: Vec<String>,
}

/// An admitted email with its optional LLM verdict.
struct ProcessedEmail {
    filtered: FilteredEmail,
    classification: Option<ClassifyResponse>,
    /// Whether the second-pass validator confirmed the verdict.
    validated: bool,
    /// Set when the validator could not run; the conversation is flagged
    /// for manual review.
    needs_review: bool,
}

pub struct Tracker {
    db: Database,
    provider: Box<dyn EmailProvider>,
    filter: Filter,
    classifier: Option<Arc<ClassifierClient>>,
    config: Config,
    learner: Learner,
    body_cipher: Option<BodyCipher>,
    user_email: String,
}

impl Tracker {
    pub fn new(
        db: Database,
        provider: Box<dyn EmailProvider>,
        filter: Filter,
        classifier: Option<ClassifierClient>,
        config: Config,
    ) -> Result<Self, JobError> {
        let body_cipher = if config.privacy.store_email_body {
            Some(BodyCipher::load_or_create(
                &config.privacy.encryption_key_path,
            )?)
        } else {
            None
        };

        Ok(Self {
            learner: Learner::new(db.clone()),
            db,
            provider,
            filter,
            classifier: classifier.map(Arc::new),
            config,
            body_cipher,
            user_email: String::new(),
        })
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn provider(&self) -> &dyn EmailProvider {
        self.provider.as_ref()
    }

    pub async fn authenticate(&mut self, cancel: &CancellationToken) -> Result<(), JobError> {
        self.provider.authenticate(cancel).await
    }

    pub fn user_email(&self) -> Result<String, JobError> {
        self.provider.user_email()
    }

    /// Run one sync. The cancellation token propagates to every stage;
    /// the sync cursor only advances when the run completes.
    pub async fn sync(
        &mut self,
        opts: SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, JobError> {
        let mut result = SyncResult::default();

        let report = |phase: Phase, current: usize, total: usize, description: &'static str| {
            if let Some(cb) = &opts.progress {
                cb(Progress {
                    phase,
                    current,
                    total,
                    description,
                });
            }
        };

        // Direction detection needs the account owner's address.
        let user_email = self.provider.user_email()?;
        self.user_email = user_email.clone();
        self.filter.set_user_email(&user_email);

        // Learned rules are reloaded from the store on every run.
        match self.load_learned_rules() {
            Ok(rules) => self.filter.set_learned(rules),
            Err(e) => result
                .warnings
                .push(format!("failed to load learned filters: {}", e)),
        }

        let mut sync_state = self.db.get_sync_state()?;

        let mut fetch_opts = FetchOptions {
            max_results: self.config.gmail.max_results,
            ..Default::default()
        };
        if let Some(days) = opts.days {
            fetch_opts.after = Some(Utc::now() - Duration::days(days));
        } else if opts.full_sync {
            // Keep the default 30-day window, ignore the cursor.
        } else if let Some(last) = sync_state.last_sync_at {
            fetch_opts.after = Some(last);
        }

        // Wire provider progress into the caller's callback.
        if let Some(cb) = opts.progress.clone() {
            self.provider
                .set_progress_callback(Arc::new(move |phase, current, total| {
                    let (phase, description) = match phase {
                        "listing" => (Phase::Listing, "Listing messages"),
                        _ => (Phase::Fetching, "Downloading message content"),
                    };
                    cb(Progress {
                        phase,
                        current,
                        total,
                        description,
                    });
                }));
        }

        let emails = self.provider.fetch(&fetch_opts, cancel).await?;
        result.emails_fetched = emails.len();
        info!(count = emails.len(), "fetched messages");

        if emails.is_empty() {
            sync_state.last_sync_at = Some(Utc::now());
            let _ = self.db.update_sync_state(&sync_state);
            return Ok(result);
        }

        // Admission filter.
        report(Phase::Filtering, 0, emails.len(), "Applying filters");
        let total = emails.len();
        let filtered = self.filter.apply_batch(emails);
        let included = filter::included(&filtered);
        let uncertain = filter::uncertain(&filtered);
        report(Phase::Filtering, total, total, "Filtering complete");

        result.emails_filtered = included.len();

        let mut to_process: Vec<ProcessedEmail> = included
            .into_iter()
            .map(|fe| ProcessedEmail {
                filtered: fe,
                classification: None,
                validated: false,
                needs_review: false,
            })
            .collect();

        // LLM classification of the uncertain band.
        let skip_classification = opts.skip_classification || opts.background_classify;
        let classifier = match &self.classifier {
            Some(c) if !skip_classification && !uncertain.is_empty() => {
                if c.is_running().await {
                    Some(Arc::clone(c))
                } else {
                    warn!("classification service unreachable, skipping LLM stage");
                    None
                }
            }
            _ => None,
        };

        if let Some(classifier) = classifier {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            self.classify_uncertain(&classifier, &uncertain, &mut to_process, &mut result, &report, cancel)
                .await?;
        } else if !uncertain.is_empty() {
            result.classification_skipped = true;
            result.emails_pending_classify = uncertain.len();
        }

        // Merge admitted emails into conversations.
        let total = to_process.len();
        for (i, pe) in to_process.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            report(Phase::Processing, i + 1, total, "Processing into conversations");

            match self.process_email(pe) {
                Ok(Some(true)) => result.conversations_new += 1,
                Ok(Some(false)) => result.conversations_updated += 1,
                Ok(None) => {} // duplicate, silently skipped
                Err(e) => result.warnings.push(e.to_string()),
            }
        }

        // Cursor advances only after the writes above succeeded.
        sync_state.last_sync_at = Some(Utc::now());
        sync_state.emails_processed += result.emails_fetched as i64;
        if let Err(e) = self.db.update_sync_state(&sync_state) {
            result.warnings.push(format!("failed to update sync state: {}", e));
        }

        report(Phase::UpdatingStatus, 0, 0, "Updating conversation statuses");
        if let Err(e) = self.update_all_statuses() {
            result.warnings.push(format!("failed to update statuses: {}", e));
        }

        Ok(result)
    }

    fn load_learned_rules(&self) -> Result<LearnedRules, JobError> {
        use crate::db::models::FilterType;
        Ok(LearnedRules {
            domain_whitelist: self.db.get_active_learned(FilterType::DomainWhitelist)?,
            domain_blacklist: self.db.get_learned_blacklist()?,
            subject_blacklist: self.db.get_active_learned(FilterType::SubjectBlacklist)?,
            subject_keywords: self.db.get_active_learned(FilterType::SubjectKeyword)?,
            body_keywords: self.db.get_active_learned(FilterType::BodyKeyword)?,
        })
    }

    /// Classify the uncertain slice: batch endpoint first, parallel
    /// per-item fan-out as fallback, then the validation pass for the
    /// medium-confidence band.
    async fn classify_uncertain(
        &self,
        classifier: &Arc<ClassifierClient>,
        uncertain: &[FilteredEmail],
        to_process: &mut Vec<ProcessedEmail>,
        result: &mut SyncResult,
        report: &impl Fn(Phase, usize, usize, &'static str),
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let primary = self.config.llm.primary.clone();
        let fallback = self.config.llm.fallback.clone();
        let total = uncertain.len();

        report(Phase::Classifying, 0, total, "Classifying with LLM");

        let mut batch_results: Vec<BatchClassifyResult> = Vec::with_capacity(total);
        for (chunk_index, chunk) in uncertain.chunks(BATCH_SIZE).enumerate() {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let chunk_start = chunk_index * BATCH_SIZE;
            let items: Vec<BatchEmailItem> = chunk
                .iter()
                .map(|fe| BatchEmailItem {
                    subject: fe.email.subject.clone(),
                    body: fe.email.body.clone(),
                    from_address: fe.email.from.email.clone(),
                })
                .collect();

            match classifier.classify_batch_api(&items, &primary).await {
                Ok(resp) if resp.results.len() == chunk.len() => {
                    for (i, response) in resp.results.into_iter().enumerate() {
                        batch_results.push(BatchClassifyResult {
                            index: chunk_start + i,
                            response: Some(response),
                            error: None,
                        });
                    }
                    report(
                        Phase::Classifying,
                        chunk_start + chunk.len(),
                        total,
                        "Classifying with LLM",
                    );
                }
                _ => {
                    // Batch endpoint missing or broken: per-item fan-out.
                    debug!("batch classify unavailable, falling back to per-item calls");
                    let requests: Vec<ClassifyRequest> = chunk
                        .iter()
                        .map(|fe| ClassifyRequest {
                            email_subject: fe.email.subject.clone(),
                            email_body: fe.email.body.clone(),
                            email_from: fe.email.from.email.clone(),
                            provider: String::new(),
                            model: None,
                        })
                        .collect();

                    let results = classifier
                        .classify_batch(requests, &primary, &fallback, cancel, None)
                        .await;
                    for r in results {
                        batch_results.push(BatchClassifyResult {
                            index: chunk_start + r.index,
                            response: r.response,
                            error: r.error,
                        });
                    }
                    report(
                        Phase::Classifying,
                        chunk_start + chunk.len(),
                        total,
                        "Classifying with LLM",
                    );
                }
            }
        }

        // Sort verdicts into immediate includes and the validation band.
        let min_confidence = classifier.min_confidence();
        let mut needs_validation: Vec<(usize, ClassifyResponse)> = Vec::new();

        for br in batch_results {
            if let Some(err) = br.error {
                if matches!(err, JobError::Cancelled) {
                    return Err(JobError::Cancelled);
                }
                result.warnings.push(format!("classification failed: {}", err));
                continue;
            }

            result.emails_classified += 1;
            let _ = self.db.record_metric(MetricField::Processed, 1);

            let Some(classification) = br.response else {
                continue;
            };
            if !classification.is_job_related || classification.confidence < min_confidence {
                let _ = self.db.record_metric(MetricField::Excluded, 1);
                continue;
            }

            if classification.confidence < CONFIDENCE_HIGH
                && classification.confidence >= CONFIDENCE_MEDIUM
            {
                needs_validation.push((br.index, classification));
                continue;
            }

            // High tier: no validation.
            let fe = &uncertain[br.index];
            let _ = self.db.record_metric(MetricField::AutoIncluded, 1);
            if let Err(e) = self
                .learner
                .learn_from_email(&fe.email, classification.confidence)
            {
                result.warnings.push(format!("learner: {}", e));
            }

            to_process.push(make_processed(
                fe,
                classification.confidence,
                classification,
                false,
                false,
            ));
        }

        // Second pass for the medium band.
        if needs_validation.is_empty() {
            return Ok(());
        }

        let total_validations = needs_validation.len();
        report(Phase::Validating, 0, total_validations, "Validating uncertain emails");

        for (j, (index, classification)) in needs_validation.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            report(Phase::Validating, j + 1, total_validations, "Validating uncertain emails");

            let fe = &uncertain[index];
            let req = ValidateRequest {
                email_subject: fe.email.subject.clone(),
                email_body: fe.email.body.clone(),
                email_from: fe.email.from.email.clone(),
                provider: String::new(),
            };

            match classifier
                .validate_with_fallback(req, &self.config.llm.primary, &self.config.llm.fallback)
                .await
            {
                Err(e) => {
                    // Keep it, but unvalidated, at the original confidence.
                    result
                        .warnings
                        .push(format!("validation failed for {}: {}", fe.email.from.email, e));
                    let confidence = classification.confidence;
                    to_process.push(make_processed(fe, confidence, classification, false, true));
                }
                Ok(verdict) if verdict.final_verdict => {
                    let _ = self.db.record_metric(MetricField::Validated, 1);
                    if let Err(e) = self.learner.learn_from_email(&fe.email, verdict.confidence) {
                        result.warnings.push(format!("learner: {}", e));
                    }
                    to_process.push(make_processed(
                        fe,
                        verdict.confidence,
                        classification,
                        true,
                        false,
                    ));
                }
                Ok(verdict) => {
                    // Validator caught a false positive; record for audit.
                    let _ = self.db.record_metric(MetricField::Excluded, 1);
                    result.warnings.push(format!(
                        "validation rejected: {}{}",
                        fe.email.from.email,
                        verdict
                            .reasoning
                            .map(|r| format!(" (reason: {})", r))
                            .unwrap_or_default()
                    ));
                }
            }
        }

        Ok(())
    }

    /// Merge one admitted email into its conversation.
    ///
    /// Returns `Some(true)` when a conversation was created, `Some(false)`
    /// when an existing one was extended, `None` for a duplicate.
    fn process_email(&self, pe: &ProcessedEmail) -> Result<Option<bool>, JobError> {
        let email = &pe.filtered.email;

        if self.db.get_email_by_provider_id(&email.id)?.is_some() {
            return Ok(None);
        }

        let (conv, is_new) = self.find_or_create_conversation(email, pe.classification.as_ref())?;

        let direction = if email.is_from_me(&self.user_email) {
            Direction::Outbound
        } else {
            Direction::Inbound
        };

        // Outbound: "to" is the counterparty. Inbound: record To[0] too.
        let to_address = email.to.first().map(|a| a.email.clone());

        let (body_stored, body_encrypted) = match (&self.body_cipher, email.body.is_empty()) {
            (Some(cipher), false) => (true, Some(cipher.encrypt(&email.body)?)),
            _ => (false, None),
        };

        let extracted_data = pe.classification.as_ref().and_then(|c| {
            let mut value = serde_json::to_value(c).ok()?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("validated".into(), serde_json::Value::Bool(pe.validated));
            }
            serde_json::to_string(&value).ok()
        });

        let mut row = Email {
            id: String::new(),
            conversation_id: conv.id.clone(),
            provider_id: email.id.clone(),
            thread_id: email.thread_id.clone(),
            subject: Some(email.subject.clone()),
            from_address: email.from.email.clone(),
            from_name: Some(email.from.name.clone()).filter(|n| !n.is_empty()),
            to_address,
            date: email.date,
            direction,
            snippet: Some(email.snippet.clone()).filter(|s| !s.is_empty()),
            body_stored,
            body_encrypted,
            classification: Some(pe.filtered.result.layer.as_str().to_string()),
            confidence: Some(pe.filtered.result.confidence),
            extracted_data,
            created_at: Utc::now(),
        };
        self.db.create_email(&mut row)?;
        self.db.increment_email_count(&conv.id)?;

        let mut conv = conv;
        let mut dirty = false;
        if email.date > conv.last_activity_at {
            conv.last_activity_at = email.date;
            dirty = true;
        }
        if pe.needs_review && !conv.review_suggested {
            conv.review_suggested = true;
            dirty = true;
        }
        if dirty {
            // Mirror the increment above; the snapshot predates it.
            conv.email_count += 1;
            self.db.update_conversation(&conv)?;
        }

        Ok(Some(is_new))
    }

    /// Grouping rules, in order: same thread, same recruiter address,
    /// otherwise a new conversation.
    fn find_or_create_conversation(
        &self,
        email: &EmailMessage,
        classification: Option<&ClassifyResponse>,
    ) -> Result<(Conversation, bool), JobError> {
        if !email.thread_id.is_empty() {
            if let Some(conv) = self.db.get_conversation_by_thread_id(&email.thread_id)? {
                return Ok((conv, false));
            }
        }

        let is_outbound = email.is_from_me(&self.user_email);
        let counterparty = if is_outbound {
            email.to.first().cloned()
        } else {
            Some(email.from.clone())
        };
        let Some(counterparty) = counterparty else {
            return Err(JobError::Other(format!(
                "outbound message {} has no recipient",
                email.id
            )));
        };

        if let Some(conv) = self
            .db
            .get_conversation_by_recruiter_email(&counterparty.email)?
        {
            return Ok((conv, false));
        }

        let company = self.extract_company_name(email, classification);

        let mut recruiter_name = counterparty.name.clone();
        if let Some(name) = classification.and_then(|c| c.recruiter_name.clone()) {
            if !name.is_empty() {
                recruiter_name = name;
            }
        }

        let position = classification
            .and_then(|c| c.position.clone())
            .filter(|p| !p.is_empty());

        let mut conv = Conversation {
            id: String::new(),
            company,
            position,
            recruiter_name: Some(recruiter_name).filter(|n| !n.is_empty()),
            recruiter_email: Some(counterparty.email.clone()),
            direction: if is_outbound {
                Direction::Outbound
            } else {
                Direction::Inbound
            },
            status: ConversationStatus::Active,
            last_activity_at: email.date,
            email_count: 0,
            archived: false,
            review_suggested: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.db.create_conversation(&mut conv)?;

        Ok((conv, true))
    }

    /// Company display name: LLM extraction wins, then the LinkedIn
    /// special case, then the domain heuristic with the raw domain as a
    /// last resort.
    fn extract_company_name(
        &self,
        email: &EmailMessage,
        classification: Option<&ClassifyResponse>,
    ) -> String {
        let relevant = if email.is_from_me(&self.user_email) {
            email.to.first().cloned().unwrap_or_else(|| email.from.clone())
        } else {
            email.from.clone()
        };
        let domain = relevant.domain();

        if let Some(company) = classification.and_then(|c| c.company.clone()) {
            if !company.is_empty() {
                return company;
            }
        }

        if relevant.email.to_lowercase().contains("linkedin.com") {
            if !relevant.name.is_empty() {
                return format!("{} (via LinkedIn)", relevant.name);
            }
            return "LinkedIn InMail".to_string();
        }

        let company = filter::company_from_domain(&domain);
        if company.is_empty() {
            domain
        } else {
            company
        }
    }

    /// Recompute statuses for every open conversation.
    pub fn update_all_statuses(&self) -> Result<usize, JobError> {
        let convs = self.db.list_conversations(&ListOptions::default())?;
        let mut changed = 0;

        for mut conv in convs {
            if conv.status == ConversationStatus::Closed {
                continue;
            }

            let emails = match self.db.list_emails_for_conversation(&conv.id) {
                Ok(emails) => emails,
                Err(_) => continue,
            };

            let new_status = status::compute_status(
                &emails,
                &self.user_email,
                self.config.tracking.stale_after_days,
            );
            if new_status != conv.status {
                conv.status = new_status;
                let _ = self.db.update_conversation(&conv);
                changed += 1;
            }
        }

        Ok(changed)
    }

    /// `mark-spam`: learn from the mistake, close and archive the
    /// conversation.
    pub fn mark_spam(&self, identifier: &str) -> Result<(Conversation, SpamFeedback), JobError> {
        self.learner.mark_spam(identifier)
    }

    /// `mark-missed`: a job-related sender the filter rejected.
    pub fn mark_missed(&self, from_address: &str) -> Result<(), JobError> {
        self.learner.record_false_negative(from_address)
    }
}

fn make_processed(
    fe: &FilteredEmail,
    confidence: f64,
    classification: ClassifyResponse,
    validated: bool,
    needs_review: bool,
) -> ProcessedEmail {
    let mut filtered = fe.clone();
    filtered.result.include = true;
    filtered.result.layer = Layer::Llm;
    filtered.result.confidence = confidence;

    ProcessedEmail {
        filtered,
        classification: Some(classification),
        validated,
        needs_review,
    }
}
