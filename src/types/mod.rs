//! Provider-agnostic email message types
//!
//! Every provider adapter converts its wire format into [`EmailMessage`]
//! before the rest of the pipeline sees it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An email address with an optional display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub email: String,
}

impl Address {
    /// Parse a single address in `Name <email>` or bare `email` form.
    pub fn parse(s: &str) -> Address {
        let s = s.trim();

        if let (Some(start), Some(end)) = (s.find('<'), s.rfind('>')) {
            if end > start {
                return Address {
                    name: s[..start].trim().trim_matches('"').to_string(),
                    email: s[start + 1..end].trim().to_string(),
                };
            }
        }

        Address {
            name: String::new(),
            email: s.to_string(),
        }
    }

    /// Parse a comma-separated address list, dropping empty entries.
    pub fn parse_list(s: &str) -> Vec<Address> {
        if s.is_empty() {
            return Vec::new();
        }

        s.split(',')
            .map(Address::parse)
            .filter(|a| !a.email.is_empty())
            .collect()
    }

    /// The lowercased domain part of the address, or empty if malformed.
    pub fn domain(&self) -> String {
        match self.email.split_once('@') {
            Some((_, domain)) if !domain.is_empty() => domain.to_lowercase(),
            _ => String::new(),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// A fetched email message with provider metadata preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Provider-assigned message id (unique per account).
    pub id: String,
    /// Provider-level thread id.
    pub thread_id: String,
    pub subject: String,
    pub from: Address,
    pub to: Vec<Address>,
    pub date: DateTime<Utc>,
    /// Short preview text supplied by the provider.
    pub snippet: String,
    /// Full body; may be empty when the provider withheld it.
    pub body: String,
    pub labels: Vec<String>,
    pub is_read: bool,
    /// Selected headers worth keeping (Message-ID, In-Reply-To, ...).
    pub headers: HashMap<String, String>,
}

impl EmailMessage {
    /// The sender's domain.
    pub fn domain(&self) -> String {
        self.from.domain()
    }

    /// Whether this message was sent by the given account owner.
    pub fn is_from_me(&self, my_email: &str) -> bool {
        self.from.email.eq_ignore_ascii_case(my_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_and_email() {
        let a = Address::parse("Jane Doe <jane@acme.com>");
        assert_eq!(a.name, "Jane Doe");
        assert_eq!(a.email, "jane@acme.com");
    }

    #[test]
    fn parse_quoted_name() {
        let a = Address::parse("\"Doe, Jane\" <jane@acme.com>");
        assert_eq!(a.name, "Doe, Jane");
        assert_eq!(a.email, "jane@acme.com");
    }

    #[test]
    fn parse_bare_email() {
        let a = Address::parse("jane@acme.com");
        assert_eq!(a.name, "");
        assert_eq!(a.email, "jane@acme.com");
    }

    #[test]
    fn parse_list_skips_empty() {
        let list = Address::parse_list("a@x.com, Bob <b@y.com>");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name, "Bob");
        assert!(Address::parse_list("").is_empty());
    }

    #[test]
    fn domain_is_lowercased() {
        let a = Address::parse("jane@Acme.COM");
        assert_eq!(a.domain(), "acme.com");
        assert_eq!(Address::parse("not-an-address").domain(), "");
    }

    #[test]
    fn is_from_me_case_insensitive() {
        let msg = EmailMessage {
            id: "m1".into(),
            thread_id: "t1".into(),
            subject: String::new(),
            from: Address::parse("Me <ME@example.com>"),
            to: Vec::new(),
            date: Utc::now(),
            snippet: String::new(),
            body: String::new(),
            labels: Vec::new(),
            is_read: false,
            headers: HashMap::new(),
        };
        assert!(msg.is_from_me("me@example.com"));
        assert!(!msg.is_from_me("other@example.com"));
    }
}
