//! Full-thread view: stored metadata hydrated with live bodies from the
//! provider, falling back to snippets when a fetch fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Tracker;
use crate::db::models::Conversation;
use crate::error::JobError;

/// One email of a thread, body included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadEmail {
    pub id: String,
    pub subject: String,
    pub from: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub to: String,
    pub date: DateTime<Utc>,
    pub direction: String,
    pub body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub snippet: String,
    pub provider_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub conversation: Conversation,
    pub emails: Vec<ThreadEmail>,
    pub fetched_at: DateTime<Utc>,
}

impl Tracker {
    /// Fetch the full thread for a conversation identified by company
    /// name or id.
    pub async fn fetch_thread(&self, company_or_id: &str) -> Result<Thread, JobError> {
        let conv = self
            .db()
            .find_conversation(company_or_id)?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", company_or_id)))?;

        let db_emails = self.db().list_emails_for_conversation(&conv.id)?;
        if db_emails.is_empty() {
            return Err(JobError::NotFound(format!(
                "no emails stored for conversation: {}",
                conv.company
            )));
        }

        let mut emails = Vec::with_capacity(db_emails.len());
        for db_email in db_emails {
            let mut te = ThreadEmail {
                id: db_email.id.clone(),
                subject: db_email.subject.clone().unwrap_or_default(),
                from: db_email.from_address.clone(),
                from_name: db_email.from_name.clone().unwrap_or_default(),
                to: db_email.to_address.clone().unwrap_or_default(),
                date: db_email.date,
                direction: db_email.direction.as_str().to_string(),
                body: String::new(),
                snippet: db_email.snippet.clone().unwrap_or_default(),
                provider_id: db_email.provider_id.clone(),
            };

            match self.provider().get_message(&db_email.provider_id).await {
                Ok(full) => {
                    te.body = full.body;
                    if te.subject.is_empty() {
                        te.subject = full.subject;
                    }
                    if te.to.is_empty() {
                        if let Some(first) = full.to.first() {
                            te.to = first.email.clone();
                        }
                    }
                }
                Err(e) => {
                    // Snippet is better than nothing.
                    warn!(%e, provider_id = %db_email.provider_id, "body fetch failed, using snippet");
                    te.body = te.snippet.clone();
                }
            }

            emails.push(te);
        }

        Ok(Thread {
            conversation: conv,
            emails,
            fetched_at: Utc::now(),
        })
    }
}
