//! Row types for the SQLite store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation lifecycle state.
///
/// `Closed` is terminal: the status pass never moves a conversation out of
/// it, only explicit user action sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    WaitingOnMe,
    WaitingOnThem,
    Stale,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::WaitingOnMe => "waiting_on_me",
            Self::WaitingOnThem => "waiting_on_them",
            Self::Stale => "stale",
            Self::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "waiting_on_me" => Self::WaitingOnMe,
            "waiting_on_them" => Self::WaitingOnThem,
            "stale" => Self::Stale,
            "closed" => Self::Closed,
            _ => Self::Active,
        }
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "outbound" => Self::Outbound,
            _ => Self::Inbound,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation per distinct recruiter contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recruiter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recruiter_email: Option<String>,
    pub direction: Direction,
    pub status: ConversationStatus,
    pub last_activity_at: DateTime<Utc>,
    pub email_count: i64,
    pub archived: bool,
    pub review_suggested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn days_since_activity(&self) -> i64 {
        (Utc::now() - self.last_activity_at).num_days()
    }

    pub fn is_stale(&self, days: i64) -> bool {
        self.days_since_activity() > days
    }
}

/// A single stored email, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub conversation_id: String,
    /// Provider-assigned id; unique across the table.
    pub provider_id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub from_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    pub date: DateTime<Utc>,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub body_stored: bool,
    /// Encrypted body, never exposed through serialization.
    #[serde(skip)]
    pub body_encrypted: Option<String>,
    /// Which filter layer admitted the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Opaque JSON from the LLM classifier (company, position, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Email {
    /// Parse the extracted-data JSON, if any.
    pub fn extracted(&self) -> Option<serde_json::Value> {
        self.extracted_data
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

/// Singleton sync cursor (row id = 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_history_id: Option<String>,
    pub emails_processed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    DomainWhitelist,
    DomainBlacklist,
    SubjectBlacklist,
    SubjectKeyword,
    BodyKeyword,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainWhitelist => "domain_whitelist",
            Self::DomainBlacklist => "domain_blacklist",
            Self::SubjectBlacklist => "subject_blacklist",
            Self::SubjectKeyword => "subject_keyword",
            Self::BodyKeyword => "body_keyword",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "domain_whitelist" => Some(Self::DomainWhitelist),
            "domain_blacklist" => Some(Self::DomainBlacklist),
            "subject_blacklist" => Some(Self::SubjectBlacklist),
            "subject_keyword" => Some(Self::SubjectKeyword),
            "body_keyword" => Some(Self::BodyKeyword),
            _ => None,
        }
    }
}

/// Where a learned filter came from. Only `User` and `AiConfirmed` rules
/// (plus auto-promoted blacklist entries) are applied during filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterSource {
    User,
    AiSuggested,
    AiConfirmed,
}

impl FilterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AiSuggested => "ai_suggested",
            Self::AiConfirmed => "ai_confirmed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ai_suggested" => Self::AiSuggested,
            "ai_confirmed" => Self::AiConfirmed,
            _ => Self::User,
        }
    }
}

/// A durable filter rule learned from classification or feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedFilter {
    pub id: String,
    pub filter_type: FilterType,
    pub value: String,
    pub source: FilterSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub false_positive_count: i64,
    pub auto_blacklisted: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate numbers for `stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_conversations: i64,
    pub waiting_on_me: i64,
    pub waiting_on_them: i64,
    pub stale: i64,
    pub closed: i64,
    pub total_emails: i64,
    /// Fraction of inbound conversations with at least two messages.
    pub response_rate: f64,
    pub avg_response_time_days: f64,
}

/// Per-day classification counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub day: String,
    pub processed: i64,
    pub auto_included: i64,
    pub validated: i64,
    pub excluded: i64,
    pub false_positives: i64,
}

/// Filters for listing conversations.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub status: Option<ConversationStatus>,
    pub direction: Option<Direction>,
    pub since: Option<DateTime<Utc>>,
    pub company: Option<String>,
    pub include_archived: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Outcome of merging two conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub target_id: String,
    pub source_id: String,
    pub emails_moved: i64,
    pub total_emails: i64,
}

/// Outcome of archiving or unarchiving a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveResult {
    pub conversation_id: String,
    pub company: String,
    pub archived: bool,
}
