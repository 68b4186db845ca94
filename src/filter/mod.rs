//! Multi-layer admission filter
//!
//! Decides, per message, whether it belongs to a real recruiter
//! conversation before any LLM is consulted. Layers run in order and the
//! first decisive one wins: whitelist, domain blacklist, subject
//! blacklist, then keyword scoring. Messages the keywords cannot decide
//! come out `Uncertain` and are handed to the classifier.
//!
//! The filter is a pure function of its inputs: same message, same
//! configured and learned rules, same verdict.

mod domain;
mod keyword;

pub use domain::company_from_domain;

use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::types::{Address, EmailMessage};

/// Which layer produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Whitelist,
    Blacklist,
    Keyword,
    Uncertain,
    Rejected,
    /// Set by the pipeline when the LLM makes the final call.
    Llm,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
            Self::Keyword => "keyword",
            Self::Uncertain => "uncertain",
            Self::Rejected => "rejected",
            Self::Llm => "llm",
        }
    }
}

/// Verdict for one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
    pub include: bool,
    pub layer: Layer,
    /// Confidence in the decision, 0.0..=1.0.
    pub confidence: f64,
    pub reason: String,
}

/// A message paired with its verdict.
#[derive(Debug, Clone)]
pub struct FilteredEmail {
    pub email: EmailMessage,
    pub result: FilterResult,
}

/// Per-layer counts over a filtered batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FilterStats {
    pub total: usize,
    pub whitelisted: usize,
    pub blacklisted: usize,
    pub by_keyword: usize,
    pub uncertain: usize,
    pub rejected: usize,
}

/// Runtime additions to the configured rules, loaded from the store at
/// the start of each sync.
#[derive(Debug, Clone, Default)]
pub struct LearnedRules {
    pub domain_whitelist: Vec<String>,
    pub domain_blacklist: Vec<String>,
    pub subject_blacklist: Vec<String>,
    pub subject_keywords: Vec<String>,
    pub body_keywords: Vec<String>,
}

pub struct Filter {
    config: FilterConfig,
    learned: LearnedRules,
    /// Account owner's address; used to pick the relevant counterparty
    /// for outbound messages.
    user_email: String,
}

impl Filter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            learned: LearnedRules::default(),
            user_email: String::new(),
        }
    }

    pub fn set_user_email(&mut self, email: &str) {
        self.user_email = email.to_string();
    }

    pub fn set_learned(&mut self, learned: LearnedRules) {
        self.learned = learned;
    }

    pub fn add_learned_blacklist(&mut self, domains: Vec<String>) {
        self.learned.domain_blacklist.extend(domains);
    }

    /// The address we are actually corresponding with: the recipient for
    /// outbound messages, the sender otherwise.
    pub fn relevant_address<'a>(&self, email: &'a EmailMessage) -> Option<&'a Address> {
        if !self.user_email.is_empty() && email.is_from_me(&self.user_email) {
            email.to.first()
        } else {
            Some(&email.from)
        }
    }

    fn domain_whitelist(&self) -> impl Iterator<Item = &str> {
        self.config
            .domain_whitelist
            .iter()
            .chain(self.learned.domain_whitelist.iter())
            .map(String::as_str)
    }

    fn domain_blacklist(&self) -> impl Iterator<Item = &str> {
        self.config
            .domain_blacklist
            .iter()
            .chain(self.learned.domain_blacklist.iter())
            .map(String::as_str)
    }

    fn subject_blacklist(&self) -> impl Iterator<Item = &str> {
        self.config
            .subject_blacklist
            .iter()
            .chain(self.learned.subject_blacklist.iter())
            .map(String::as_str)
    }

    pub(crate) fn subject_keywords(&self) -> Vec<&str> {
        self.config
            .subject_keywords
            .iter()
            .chain(self.learned.subject_keywords.iter())
            .map(String::as_str)
            .collect()
    }

    pub(crate) fn body_keywords(&self) -> Vec<&str> {
        self.config
            .body_keywords
            .iter()
            .chain(self.learned.body_keywords.iter())
            .map(String::as_str)
            .collect()
    }

    /// Run one message through the layers.
    pub fn apply(&self, email: &EmailMessage) -> FilterResult {
        let relevant = self.relevant_address(email).cloned().unwrap_or_default();
        let domain = relevant.domain();
        let full_email = relevant.email.to_lowercase();

        // L1: whitelist, auto-include
        for pattern in self.domain_whitelist() {
            if domain::matches_domain_pattern(&domain, &full_email, pattern) {
                return FilterResult {
                    include: true,
                    layer: Layer::Whitelist,
                    confidence: 1.0,
                    reason: format!("whitelisted domain: {}", pattern),
                };
            }
        }

        // L2a: domain blacklist, auto-exclude
        for pattern in self.domain_blacklist() {
            if domain::matches_domain_pattern(&domain, &full_email, pattern) {
                return FilterResult {
                    include: false,
                    layer: Layer::Blacklist,
                    confidence: 1.0,
                    reason: format!("blacklisted sender: {}", pattern),
                };
            }
        }

        // L2b: subject blacklist, auto-exclude
        let subject_lower = email.subject.to_lowercase();
        for pattern in self.subject_blacklist() {
            if subject_lower.contains(&pattern.to_lowercase()) {
                return FilterResult {
                    include: false,
                    layer: Layer::Blacklist,
                    confidence: 0.9,
                    reason: format!("subject matches blacklist pattern: {:?}", pattern),
                };
            }
        }

        // L3: keyword scoring
        keyword::score(self, email)
    }

    pub fn apply_batch(&self, emails: Vec<EmailMessage>) -> Vec<FilteredEmail> {
        emails
            .into_iter()
            .map(|email| {
                let result = self.apply(&email);
                FilteredEmail { email, result }
            })
            .collect()
    }
}

/// Messages admitted by whitelist or keywords.
pub fn included(filtered: &[FilteredEmail]) -> Vec<FilteredEmail> {
    filtered
        .iter()
        .filter(|f| f.result.include)
        .cloned()
        .collect()
}

/// Messages the keyword layer could not decide; these go to the LLM.
pub fn uncertain(filtered: &[FilteredEmail]) -> Vec<FilteredEmail> {
    filtered
        .iter()
        .filter(|f| f.result.layer == Layer::Uncertain)
        .cloned()
        .collect()
}

pub fn stats(filtered: &[FilteredEmail]) -> FilterStats {
    let mut s = FilterStats {
        total: filtered.len(),
        ..Default::default()
    };

    for f in filtered {
        match f.result.layer {
            Layer::Whitelist => s.whitelisted += 1,
            Layer::Blacklist => s.blacklisted += 1,
            Layer::Keyword => s.by_keyword += 1,
            Layer::Uncertain => s.uncertain += 1,
            Layer::Rejected => s.rejected += 1,
            Layer::Llm => {}
        }
    }

    s
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    pub fn make_email(from: &str, subject: &str, body: &str) -> EmailMessage {
        EmailMessage {
            id: "m1".into(),
            thread_id: "t1".into(),
            subject: subject.to_string(),
            from: Address::parse(from),
            to: vec![Address::parse("me@example.com")],
            date: Utc::now(),
            snippet: String::new(),
            body: body.to_string(),
            labels: Vec::new(),
            is_read: false,
            headers: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_email;
    use super::*;

    fn filter_with(config: FilterConfig) -> Filter {
        let mut f = Filter::new(config);
        f.set_user_email("me@example.com");
        f
    }

    #[test]
    fn whitelist_wins_over_everything() {
        let f = filter_with(FilterConfig {
            domain_whitelist: vec!["greenhouse.io".into()],
            subject_blacklist: vec!["job alert".into()],
            ..Default::default()
        });

        // Subject would hit the blacklist, but L1 fires first.
        let r = f.apply(&make_email("alice@greenhouse.io", "job alert: Role at Acme", ""));
        assert!(r.include);
        assert_eq!(r.layer, Layer::Whitelist);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn domain_blacklist_excludes() {
        let f = filter_with(FilterConfig {
            domain_blacklist: vec!["noreply@linkedin.com".into()],
            ..Default::default()
        });

        let r = f.apply(&make_email("noreply@linkedin.com", "New jobs for you", ""));
        assert!(!r.include);
        assert_eq!(r.layer, Layer::Blacklist);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn subject_blacklist_is_case_insensitive() {
        let f = filter_with(FilterConfig {
            subject_blacklist: vec!["weekly digest".into()],
            ..Default::default()
        });

        let r = f.apply(&make_email("someone@company.com", "Your WEEKLY Digest", ""));
        assert!(!r.include);
        assert_eq!(r.layer, Layer::Blacklist);
        assert!((r.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn outbound_uses_recipient_as_relevant_address() {
        let mut f = Filter::new(FilterConfig {
            domain_whitelist: vec!["lever.co".into()],
            ..Default::default()
        });
        f.set_user_email("me@example.com");

        let mut email = make_email("me@example.com", "Re: the role", "");
        email.to = vec![Address::parse("Recruiter <rec@lever.co>")];

        let r = f.apply(&email);
        assert!(r.include);
        assert_eq!(r.layer, Layer::Whitelist);
    }

    #[test]
    fn learned_blacklist_applies_at_layer_two() {
        let mut f = filter_with(FilterConfig::default());
        f.add_learned_blacklist(vec!["spammy.example".into()]);

        let r = f.apply(&make_email("x@spammy.example", "hi", ""));
        assert!(!r.include);
        assert_eq!(r.layer, Layer::Blacklist);
    }

    #[test]
    fn no_rules_means_rejected() {
        let f = filter_with(FilterConfig::default());
        let r = f.apply(&make_email("x@unknown.example", "lunch tomorrow?", "see you then"));
        assert!(!r.include);
        assert_eq!(r.layer, Layer::Rejected);
    }

    #[test]
    fn determinism() {
        let f = filter_with(FilterConfig::default());
        let email = make_email("x@y.com", "an opportunity for you", "your experience fits");
        let a = f.apply(&email);
        let b = f.apply(&email);
        assert_eq!(a.layer, b.layer);
        assert_eq!(a.include, b.include);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn batch_stats_add_up() {
        let f = filter_with(FilterConfig {
            domain_whitelist: vec!["greenhouse.io".into()],
            domain_blacklist: vec!["mailchimp.com".into()],
            ..Default::default()
        });

        let filtered = f.apply_batch(vec![
            make_email("a@greenhouse.io", "role", ""),
            make_email("b@mailchimp.com", "newsletter", ""),
            make_email("c@other.com", "hello", ""),
        ]);

        let s = stats(&filtered);
        assert_eq!(s.total, 3);
        assert_eq!(s.whitelisted, 1);
        assert_eq!(s.blacklisted, 1);
        assert_eq!(s.rejected, 1);
        assert_eq!(included(&filtered).len(), 1);
    }
}
