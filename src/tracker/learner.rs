//! Filter learning
//!
//! Turns classification outcomes and user feedback into durable
//! [`LearnedFilter`] rows. Suggestions from high-confidence
//! classifications stay inert until approved; false-positive feedback
//! builds toward the auto-blacklist threshold.

use chrono::Utc;
use tracing::debug;

use crate::db::models::{FilterSource, FilterType, LearnedFilter};
use crate::db::{Database, AUTO_BLACKLIST_THRESHOLD};
use crate::error::JobError;
use crate::filter::company_from_domain;
use crate::types::EmailMessage;

/// Minimum classifier confidence before we bother suggesting a rule.
const SUGGEST_CONFIDENCE: f64 = 0.7;

/// Subject phrases that flag real recruiter outreach.
const RECRUITING_PHRASES: &[&str] = &[
    "exciting opportunity",
    "perfect fit",
    "great fit",
    "your background",
    "your experience",
    "your profile",
    "reaching out",
    "touch base",
    "quick chat",
    "quick call",
    "open role",
    "open position",
    "new role",
    "new position",
    "career opportunity",
    "job opportunity",
];

/// Subject phrases that flag alerts and newsletters.
const BLACKLIST_PHRASES: &[&str] = &[
    "job alert",
    "new jobs",
    "jobs for you",
    "weekly digest",
    "daily digest",
    "newsletter",
    "unsubscribe",
    "view in browser",
];

/// Consumer mail domains too generic to act on.
const COMMON_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "icloud.com",
    "protonmail.com",
    "mail.com",
];

#[derive(Clone)]
pub struct Learner {
    db: Database,
}

/// Outcome of a `mark-spam` report, for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpamFeedback {
    pub domain: String,
    pub false_positive_count: i64,
    pub auto_blacklisted: bool,
}

impl Learner {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Propose filter rules from a confidently classified email. The
    /// suggestions carry `source = ai_suggested` and do nothing until the
    /// user approves them.
    pub fn learn_from_email(&self, email: &EmailMessage, confidence: f64) -> Result<(), JobError> {
        if confidence < SUGGEST_CONFIDENCE {
            return Ok(());
        }

        self.suggest_domain(email, confidence)?;
        self.suggest_subject_keywords(email)?;
        Ok(())
    }

    fn suggest_domain(&self, email: &EmailMessage, confidence: f64) -> Result<(), JobError> {
        let domain = email.domain();
        if domain.is_empty() || is_common_domain(&domain) || is_ats_domain(&domain) {
            return Ok(());
        }

        if self
            .db
            .learned_filter_exists(FilterType::DomainWhitelist, &domain)?
        {
            return Ok(());
        }

        debug!(%domain, "suggesting domain whitelist rule");
        self.db.create_learned_filter(&mut LearnedFilter {
            id: String::new(),
            filter_type: FilterType::DomainWhitelist,
            value: domain,
            source: FilterSource::AiSuggested,
            confidence: Some(confidence),
            false_positive_count: 0,
            auto_blacklisted: false,
            created_at: Utc::now(),
        })
    }

    fn suggest_subject_keywords(&self, email: &EmailMessage) -> Result<(), JobError> {
        let subject = email.subject.to_lowercase();

        for phrase in RECRUITING_PHRASES {
            if !subject.contains(phrase) {
                continue;
            }
            if self
                .db
                .learned_filter_exists(FilterType::SubjectKeyword, phrase)?
            {
                continue;
            }

            self.db.create_learned_filter(&mut LearnedFilter {
                id: String::new(),
                filter_type: FilterType::SubjectKeyword,
                value: phrase.to_string(),
                source: FilterSource::AiSuggested,
                confidence: None,
                false_positive_count: 0,
                auto_blacklisted: false,
                created_at: Utc::now(),
            })?;
        }

        Ok(())
    }

    /// `mark-spam`: count a false positive against the sender's domain and
    /// capture any blacklistable subject phrases. Crossing the threshold
    /// promotes the domain to the active blacklist.
    pub fn record_false_positive(
        &self,
        from_address: &str,
        subject: &str,
    ) -> Result<SpamFeedback, JobError> {
        let domain = domain_of(from_address);

        let mut feedback = SpamFeedback {
            domain: domain.clone(),
            false_positive_count: 0,
            auto_blacklisted: false,
        };

        if !domain.is_empty() && !is_common_domain(&domain) {
            self.db.mark_false_positive(&domain)?;
            feedback.false_positive_count = self.db.get_false_positive_count(&domain)?;

            if feedback.false_positive_count >= AUTO_BLACKLIST_THRESHOLD {
                self.db.promote_to_auto_blacklist(&domain)?;
                feedback.auto_blacklisted = true;
            }
        }

        let subject_lower = subject.to_lowercase();
        for phrase in BLACKLIST_PHRASES {
            if !subject_lower.contains(phrase) {
                continue;
            }
            if self
                .db
                .learned_filter_exists(FilterType::SubjectBlacklist, phrase)?
            {
                continue;
            }

            self.db.create_learned_filter(&mut LearnedFilter {
                id: String::new(),
                filter_type: FilterType::SubjectBlacklist,
                value: phrase.to_string(),
                source: FilterSource::User,
                confidence: None,
                false_positive_count: 1,
                auto_blacklisted: false,
                created_at: Utc::now(),
            })?;
        }

        Ok(feedback)
    }

    /// `mark-spam` on a whole conversation: learn from its first email,
    /// then close and archive it.
    pub fn mark_spam(
        &self,
        identifier: &str,
    ) -> Result<(crate::db::models::Conversation, SpamFeedback), JobError> {
        use crate::db::models::ConversationStatus;
        use crate::db::MetricField;

        let mut conv = self
            .db
            .find_conversation(identifier)?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", identifier)))?;

        let emails = self.db.list_emails_for_conversation(&conv.id)?;
        let (from_address, subject) = match emails.first() {
            Some(first) => (
                first.from_address.clone(),
                first.subject.clone().unwrap_or_default(),
            ),
            None => (
                conv.recruiter_email.clone().unwrap_or_default(),
                String::new(),
            ),
        };

        let feedback = self.record_false_positive(&from_address, &subject)?;
        let _ = self.db.record_metric(MetricField::FalsePositives, 1);

        conv.status = ConversationStatus::Closed;
        self.db.update_conversation(&conv)?;
        self.db.archive_conversation(&conv.id)?;

        Ok((conv, feedback))
    }

    /// `mark-missed`: a wrongly excluded sender earns a user whitelist
    /// rule, unless the domain is too generic to be a signal.
    pub fn record_false_negative(&self, from_address: &str) -> Result<(), JobError> {
        let domain = domain_of(from_address);
        if domain.is_empty() || is_common_domain(&domain) || is_ats_domain(&domain) {
            return Ok(());
        }

        if self
            .db
            .learned_filter_exists(FilterType::DomainWhitelist, &domain)?
        {
            return Ok(());
        }

        self.db.create_learned_filter(&mut LearnedFilter {
            id: String::new(),
            filter_type: FilterType::DomainWhitelist,
            value: domain,
            source: FilterSource::User,
            confidence: None,
            false_positive_count: 0,
            auto_blacklisted: false,
            created_at: Utc::now(),
        })
    }
}

fn domain_of(address: &str) -> String {
    match address.split_once('@') {
        Some((_, d)) if !d.is_empty() => d.to_lowercase(),
        _ => String::new(),
    }
}

fn is_common_domain(domain: &str) -> bool {
    COMMON_DOMAINS.contains(&domain.to_lowercase().as_str())
}

/// ATS domains are shared infrastructure, useless as sender rules. The
/// company-name heuristic already knows the set.
fn is_ats_domain(domain: &str) -> bool {
    company_from_domain(domain).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::test_support::make_email;

    #[test]
    fn high_confidence_email_suggests_inert_whitelist() {
        let db = Database::in_memory().unwrap();
        let learner = Learner::new(db.clone());

        let email = make_email("jane@acmecorp.com", "exciting opportunity at Acme", "");
        learner.learn_from_email(&email, 0.9).unwrap();

        let filters = db.list_learned_filters(None).unwrap();
        let types: Vec<FilterType> = filters.iter().map(|f| f.filter_type).collect();
        assert!(types.contains(&FilterType::DomainWhitelist));
        assert!(types.contains(&FilterType::SubjectKeyword));
        assert!(filters.iter().all(|f| f.source == FilterSource::AiSuggested));

        // Suggestions do not reach the active rule sets.
        assert!(db
            .get_active_learned(FilterType::DomainWhitelist)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn low_confidence_suggests_nothing() {
        let db = Database::in_memory().unwrap();
        let learner = Learner::new(db.clone());

        let email = make_email("jane@acmecorp.com", "exciting opportunity", "");
        learner.learn_from_email(&email, 0.5).unwrap();
        assert!(db.list_learned_filters(None).unwrap().is_empty());
    }

    #[test]
    fn common_and_ats_domains_are_skipped() {
        let db = Database::in_memory().unwrap();
        let learner = Learner::new(db.clone());

        learner
            .learn_from_email(&make_email("someone@gmail.com", "plain subject", ""), 0.95)
            .unwrap();
        learner
            .learn_from_email(&make_email("noreply@greenhouse.io", "plain subject", ""), 0.95)
            .unwrap();

        assert!(db.list_learned_filters(None).unwrap().is_empty());
    }

    #[test]
    fn repeated_spam_reports_cross_the_threshold() {
        let db = Database::in_memory().unwrap();
        let learner = Learner::new(db.clone());

        for i in 0..AUTO_BLACKLIST_THRESHOLD {
            let fb = learner
                .record_false_positive("noise@pestco.com", "buy now")
                .unwrap();
            assert_eq!(fb.false_positive_count, i + 1);
            assert_eq!(fb.auto_blacklisted, i + 1 >= AUTO_BLACKLIST_THRESHOLD);
        }

        assert!(db
            .get_learned_blacklist()
            .unwrap()
            .contains(&"pestco.com".to_string()));
    }

    #[test]
    fn spam_subject_phrases_become_blacklist_rules() {
        let db = Database::in_memory().unwrap();
        let learner = Learner::new(db.clone());

        learner
            .record_false_positive("alerts@jobs-spam.com", "Your weekly digest of new jobs")
            .unwrap();

        let filters = db.list_learned_filters(None).unwrap();
        let values: Vec<&str> = filters
            .iter()
            .filter(|f| f.filter_type == FilterType::SubjectBlacklist)
            .map(|f| f.value.as_str())
            .collect();
        assert!(values.contains(&"weekly digest"));
        assert!(values.contains(&"new jobs"));
    }

    #[test]
    fn false_negative_creates_user_whitelist() {
        let db = Database::in_memory().unwrap();
        let learner = Learner::new(db.clone());

        learner.record_false_negative("jane@startup.io").unwrap();
        assert_eq!(
            db.get_active_learned(FilterType::DomainWhitelist).unwrap(),
            vec!["startup.io".to_string()]
        );

        // Idempotent.
        learner.record_false_negative("bob@startup.io").unwrap();
        assert_eq!(db.list_learned_filters(None).unwrap().len(), 1);

        // Common domains never become whitelist rules.
        learner.record_false_negative("someone@gmail.com").unwrap();
        assert_eq!(db.list_learned_filters(None).unwrap().len(), 1);
    }
}
