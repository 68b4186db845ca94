//! Keyword scoring, the last filter layer.
//!
//! Hit rates over the subject and body keyword lists are combined with a
//! 2:1 weighting; hitting both lists earns a capped 1.2x bonus. Scores at
//! or above 0.30 include, below 0.02 reject, the band between is handed
//! to the LLM.

use super::{Filter, FilterResult, Layer};
use crate::types::EmailMessage;

const SUBJECT_WEIGHT: f64 = 2.0;
const BODY_WEIGHT: f64 = 1.0;
const INCLUDE_THRESHOLD: f64 = 0.30;
const UNCERTAIN_MIN: f64 = 0.02;
const BOTH_HIT_BONUS: f64 = 1.2;

/// Combine subject/body hit counts into a normalized score in [0, 1].
pub(crate) fn calculate(
    subject_matches: usize,
    total_subject_keywords: usize,
    body_matches: usize,
    total_body_keywords: usize,
) -> f64 {
    if total_subject_keywords == 0 && total_body_keywords == 0 {
        return 0.0;
    }

    let subject_score = if total_subject_keywords > 0 {
        subject_matches as f64 / total_subject_keywords as f64
    } else {
        0.0
    };
    let body_score = if total_body_keywords > 0 {
        body_matches as f64 / total_body_keywords as f64
    } else {
        0.0
    };

    let mut score = (subject_score * SUBJECT_WEIGHT + body_score * BODY_WEIGHT)
        / (SUBJECT_WEIGHT + BODY_WEIGHT);

    if subject_matches > 0 && body_matches > 0 {
        score = (score * BOTH_HIT_BONUS).min(1.0);
    }

    score
}

pub(crate) fn score(filter: &Filter, email: &EmailMessage) -> FilterResult {
    let subject_lower = email.subject.to_lowercase();
    // Snippet stands in when the body was not fetched.
    let body_lower = if email.body.is_empty() {
        email.snippet.to_lowercase()
    } else {
        email.body.to_lowercase()
    };

    let subject_keywords = filter.subject_keywords();
    let body_keywords = filter.body_keywords();

    let subject_matches = subject_keywords
        .iter()
        .filter(|kw| contains_word(&subject_lower, &kw.to_lowercase()))
        .count();
    let body_matches = body_keywords
        .iter()
        .filter(|kw| contains_word(&body_lower, &kw.to_lowercase()))
        .count();

    let score = calculate(
        subject_matches,
        subject_keywords.len(),
        body_matches,
        body_keywords.len(),
    );

    if score >= INCLUDE_THRESHOLD {
        FilterResult {
            include: true,
            layer: Layer::Keyword,
            confidence: score,
            reason: format!(
                "keyword score {:.0}% (subject: {}, body: {})",
                score * 100.0,
                subject_matches,
                body_matches
            ),
        }
    } else if score >= UNCERTAIN_MIN {
        FilterResult {
            include: false,
            layer: Layer::Uncertain,
            confidence: score,
            reason: format!("uncertain, keyword score {:.0}%", score * 100.0),
        }
    } else {
        FilterResult {
            include: false,
            layer: Layer::Rejected,
            confidence: 1.0 - score,
            reason: format!("low keyword score {:.0}%", score * 100.0),
        }
    }
}

/// Word-boundary-aware containment. Multi-word phrases fall back to plain
/// substring search; single words must not sit inside a larger word, so
/// "position" does not match "preposition".
pub(crate) fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    if word.contains(' ') {
        return text.contains(word);
    }

    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(idx) = text[start..].find(word) {
        let idx = start + idx;
        let end = idx + word.len();

        let boundary_before = idx == 0 || !is_word_byte(bytes[idx - 1]);
        let boundary_after = end >= bytes.len() || !is_word_byte(bytes[end]);
        if boundary_before && boundary_after {
            return true;
        }

        start = end;
    }

    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::make_email;
    use super::super::{Filter, Layer};
    use super::*;
    use crate::config::Config;

    #[test]
    fn word_boundaries() {
        assert!(contains_word("an open position here", "position"));
        assert!(!contains_word("a preposition here", "position"));
        assert!(contains_word("role.", "role"));
        assert!(contains_word("role", "role"));
        // phrases are plain substring
        assert!(contains_word("we are reaching out to you", "reaching out"));
    }

    #[test]
    fn second_occurrence_can_match() {
        // First hit is embedded, second stands alone.
        assert!(contains_word("preposition position", "position"));
    }

    #[test]
    fn score_bounds_and_monotonicity() {
        // More hits never lowers the score.
        let mut prev = 0.0;
        for hits in 0..=6 {
            let s = calculate(hits, 6, 0, 6);
            assert!((0.0..=1.0).contains(&s));
            assert!(s >= prev);
            prev = s;
        }

        // Bonus is capped at 1.0.
        assert!(calculate(6, 6, 6, 6) <= 1.0);
    }

    #[test]
    fn no_keywords_scores_zero() {
        assert_eq!(calculate(0, 0, 0, 0), 0.0);
    }

    #[test]
    fn both_lists_hit_earns_bonus() {
        let without = calculate(2, 6, 0, 6);
        let with = calculate(2, 6, 1, 6);
        assert!(with > without);
    }

    #[test]
    fn thresholds_route_to_layers() {
        let mut f = Filter::new(Config::default().filters);
        f.set_user_email("me@example.com");

        // Heavy keyword presence in subject and body: include.
        let strong = f.apply(&make_email(
            "rec@somecorp.com",
            "interview for a role: your application as a candidate",
            "reaching out about your experience, please send a resume, interested in a call",
        ));
        assert_eq!(strong.layer, Layer::Keyword);
        assert!(strong.include);
        assert!(strong.confidence >= 0.30);

        // A single weak body hit lands in the uncertain band.
        let weak = f.apply(&make_email(
            "someone@somewhere.com",
            "following up on our chat",
            "would love to hear about your experience",
        ));
        assert_eq!(weak.layer, Layer::Uncertain);
        assert!(weak.confidence >= 0.02 && weak.confidence < 0.30);

        // Nothing at all: rejected.
        let none = f.apply(&make_email("a@b.com", "lunch?", "see you at noon"));
        assert_eq!(none.layer, Layer::Rejected);
    }

    #[test]
    fn snippet_substitutes_for_missing_body() {
        let mut f = Filter::new(Config::default().filters);
        f.set_user_email("me@example.com");

        let mut email = make_email("rec@corp.com", "an opportunity", "");
        email.snippet = "reaching out about your background and experience".into();
        let with_snippet = f.apply(&email);

        email.snippet.clear();
        let without = f.apply(&email);

        assert!(with_snippet.confidence > without.confidence);
    }
}
