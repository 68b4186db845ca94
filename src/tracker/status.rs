//! Conversation status engine
//!
//! A pure function over a conversation's emails: who spoke last and how
//! long ago decide the state. `Closed` is terminal and never computed
//! here; callers skip closed conversations.

use chrono::Utc;

use crate::db::models::{ConversationStatus, Email};

/// Compute the status from the email history.
///
/// Empty history is `Active`; anything older than `stale_after_days` is
/// `Stale`; otherwise the side that spoke last determines whose turn it
/// is.
pub fn compute_status(emails: &[Email], my_email: &str, stale_after_days: i64) -> ConversationStatus {
    let Some(last) = emails.iter().max_by_key(|e| e.date) else {
        return ConversationStatus::Active;
    };

    let days_since = (Utc::now() - last.date).num_days();
    if days_since > stale_after_days {
        return ConversationStatus::Stale;
    }

    if is_from_me(last, my_email) {
        ConversationStatus::WaitingOnThem
    } else {
        ConversationStatus::WaitingOnMe
    }
}

fn is_from_me(email: &Email, my_email: &str) -> bool {
    email.from_address.eq_ignore_ascii_case(my_email)
}

/// Mean days between direction changes, walking the history in date
/// order. Zero when there was never a reply.
pub fn response_time_days(emails: &[Email], my_email: &str) -> f64 {
    if emails.len() < 2 {
        return 0.0;
    }

    let mut sorted: Vec<&Email> = emails.iter().collect();
    sorted.sort_by_key(|e| e.date);

    let mut total_days = 0.0;
    let mut responses = 0;

    for pair in sorted.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if is_from_me(prev, my_email) != is_from_me(curr, my_email) {
            total_days += (curr.date - prev.date).num_seconds() as f64 / 86_400.0;
            responses += 1;
        }
    }

    if responses == 0 {
        0.0
    } else {
        total_days / responses as f64
    }
}

/// Same metric computed from the stored `direction` column, for callers
/// that have no provider session to resolve the account address from.
pub fn response_time_days_by_direction(emails: &[Email]) -> f64 {
    use crate::db::models::Direction;

    if emails.len() < 2 {
        return 0.0;
    }

    let mut sorted: Vec<&Email> = emails.iter().collect();
    sorted.sort_by_key(|e| e.date);

    let mut total_days = 0.0;
    let mut responses = 0;

    for pair in sorted.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if (prev.direction == Direction::Outbound) != (curr.direction == Direction::Outbound) {
            total_days += (curr.date - prev.date).num_seconds() as f64 / 86_400.0;
            responses += 1;
        }
    }

    if responses == 0 {
        0.0
    } else {
        total_days / responses as f64
    }
}

/// Human-readable summary of the latest activity ("2 days ago - received").
pub fn last_activity_summary(emails: &[Email], my_email: &str) -> String {
    let Some(last) = emails.iter().max_by_key(|e| e.date) else {
        return "No activity".to_string();
    };

    let days = (Utc::now() - last.date).num_days();
    let direction = if is_from_me(last, my_email) {
        "sent"
    } else {
        "received"
    };

    match days {
        0 => format!("Today - {direction}"),
        1 => format!("Yesterday - {direction}"),
        2..=6 => format!("{days} days ago - {direction}"),
        7..=29 => {
            let weeks = days / 7;
            if weeks == 1 {
                format!("1 week ago - {direction}")
            } else {
                format!("{weeks} weeks ago - {direction}")
            }
        }
        _ => format!("{days} days ago - {direction}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Direction;
    use chrono::{DateTime, Duration};

    const ME: &str = "me@example.com";
    const THEM: &str = "recruiter@acme.com";

    fn make_email(from: &str, date: DateTime<Utc>) -> Email {
        Email {
            id: String::new(),
            conversation_id: "c1".into(),
            provider_id: String::new(),
            thread_id: "t1".into(),
            subject: None,
            from_address: from.to_string(),
            from_name: None,
            to_address: None,
            date,
            direction: if from == ME {
                Direction::Outbound
            } else {
                Direction::Inbound
            },
            snippet: None,
            body_stored: false,
            body_encrypted: None,
            classification: None,
            confidence: None,
            extracted_data: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_is_active() {
        assert_eq!(compute_status(&[], ME, 7), ConversationStatus::Active);
    }

    #[test]
    fn last_from_them_means_my_turn() {
        let emails = vec![
            make_email(ME, Utc::now() - Duration::days(3)),
            make_email(THEM, Utc::now() - Duration::days(1)),
        ];
        assert_eq!(compute_status(&emails, ME, 7), ConversationStatus::WaitingOnMe);
    }

    #[test]
    fn last_from_me_means_their_turn() {
        let emails = vec![
            make_email(THEM, Utc::now() - Duration::days(3)),
            make_email(ME, Utc::now() - Duration::days(1)),
        ];
        assert_eq!(compute_status(&emails, ME, 7), ConversationStatus::WaitingOnThem);
    }

    #[test]
    fn my_address_comparison_ignores_case() {
        let emails = vec![make_email("ME@Example.COM", Utc::now())];
        assert_eq!(compute_status(&emails, ME, 7), ConversationStatus::WaitingOnThem);
    }

    #[test]
    fn stale_beats_direction() {
        // Eight days old with a seven day threshold: stale either way.
        let inbound = vec![make_email(THEM, Utc::now() - Duration::days(8))];
        assert_eq!(compute_status(&inbound, ME, 7), ConversationStatus::Stale);

        let outbound = vec![make_email(ME, Utc::now() - Duration::days(8))];
        assert_eq!(compute_status(&outbound, ME, 7), ConversationStatus::Stale);
    }

    #[test]
    fn boundary_day_is_not_stale() {
        // Exactly at the threshold still counts as fresh.
        let emails = vec![make_email(THEM, Utc::now() - Duration::days(7))];
        assert_eq!(compute_status(&emails, ME, 7), ConversationStatus::WaitingOnMe);
    }

    #[test]
    fn unordered_input_uses_latest_by_date() {
        let emails = vec![
            make_email(THEM, Utc::now() - Duration::days(1)),
            make_email(ME, Utc::now() - Duration::days(5)),
            make_email(THEM, Utc::now() - Duration::days(3)),
        ];
        assert_eq!(compute_status(&emails, ME, 7), ConversationStatus::WaitingOnMe);
    }

    #[test]
    fn response_time_averages_direction_changes() {
        let start = Utc::now() - Duration::days(10);
        let emails = vec![
            make_email(THEM, start),
            make_email(ME, start + Duration::days(2)), // 2 day reply
            make_email(THEM, start + Duration::days(6)), // 4 day reply
            make_email(THEM, start + Duration::days(7)), // no change, ignored
        ];
        let avg = response_time_days(&emails, ME);
        assert!((avg - 3.0).abs() < 0.01);
    }

    #[test]
    fn direction_based_metric_matches_address_based() {
        let start = Utc::now() - Duration::days(10);
        let emails = vec![
            make_email(THEM, start),
            make_email(ME, start + Duration::days(2)),
            make_email(THEM, start + Duration::days(6)),
        ];
        assert!(
            (response_time_days(&emails, ME) - response_time_days_by_direction(&emails)).abs()
                < 1e-9
        );
    }

    #[test]
    fn response_time_zero_without_replies() {
        let emails = vec![
            make_email(THEM, Utc::now() - Duration::days(2)),
            make_email(THEM, Utc::now() - Duration::days(1)),
        ];
        assert_eq!(response_time_days(&emails, ME), 0.0);
        assert_eq!(response_time_days(&[], ME), 0.0);
    }

    #[test]
    fn activity_summary_wording() {
        let today = vec![make_email(THEM, Utc::now())];
        assert_eq!(last_activity_summary(&today, ME), "Today - received");

        let sent_yesterday = vec![make_email(ME, Utc::now() - Duration::days(1))];
        assert_eq!(last_activity_summary(&sent_yesterday, ME), "Yesterday - sent");

        let two_weeks = vec![make_email(THEM, Utc::now() - Duration::days(15))];
        assert_eq!(last_activity_summary(&two_weeks, ME), "2 weeks ago - received");

        assert_eq!(last_activity_summary(&[], ME), "No activity");
    }
}
