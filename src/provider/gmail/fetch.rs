//! Conversion from Gmail wire messages to [`EmailMessage`].

use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use google_gmail1::api::{Message, MessagePart};
use std::collections::HashMap;

use crate::provider::FetchOptions;
use crate::types::{Address, EmailMessage};

/// Build the Gmail search query for a fetch run.
pub fn build_query(opts: &FetchOptions) -> String {
    let mut parts = Vec::new();

    if let Some(after) = opts.after {
        parts.push(format!("after:{}", after.format("%Y/%m/%d")));
    }

    // Sent mail is what captures our replies to recruiters.
    if opts.include_sent {
        parts.push("(in:inbox OR in:sent)".to_string());
    }

    if !opts.query.is_empty() {
        parts.push(opts.query.clone());
    }

    parts.join(" ")
}

/// Headers preserved beyond the structured fields.
fn is_useful_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "message-id" | "in-reply-to" | "references" | "reply-to"
    )
}

/// Convert a full-format Gmail message.
pub fn convert_message(msg: Message) -> EmailMessage {
    let mut email = EmailMessage {
        id: msg.id.unwrap_or_default(),
        thread_id: msg.thread_id.unwrap_or_default(),
        subject: String::new(),
        from: Address::default(),
        to: Vec::new(),
        date: Utc::now(),
        snippet: msg.snippet.unwrap_or_default(),
        body: String::new(),
        labels: msg.label_ids.unwrap_or_default(),
        is_read: false,
        headers: HashMap::new(),
    };

    email.is_read = !email.labels.iter().any(|l| l == "UNREAD");

    let mut header_date = None;
    if let Some(payload) = &msg.payload {
        for header in payload.headers.as_deref().unwrap_or_default() {
            let (Some(name), Some(value)) = (&header.name, &header.value) else {
                continue;
            };
            match name.to_lowercase().as_str() {
                "subject" => email.subject = value.clone(),
                "from" => email.from = Address::parse(value),
                "to" => email.to = Address::parse_list(value),
                "date" => header_date = parse_date(value),
                _ => {
                    if is_useful_header(name) {
                        email.headers.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        email.body = extract_body(payload);
    }

    // Header date first, provider internal timestamp as fallback.
    email.date = header_date
        .or_else(|| {
            msg.internal_date
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
        .unwrap_or_else(Utc::now);

    email
}

/// RFC 2822 dates plus the common sloppy variants found in the wild.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // "Mon, 02 Jan 2006 15:04:05 -0700 (MST)": strip the comment.
    if let Some(idx) = s.find('(') {
        if let Ok(dt) = DateTime::parse_from_rfc2822(s[..idx].trim()) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in ["%d %b %Y %H:%M:%S %z", "%a, %d %b %Y %H:%M:%S%.3f %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s.trim(), format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    None
}

/// Prefer text/plain; fall back to tag-stripped text/html.
pub fn extract_body(payload: &MessagePart) -> String {
    let text = extract_part_by_mime(payload, "text/plain");
    if !text.is_empty() {
        return text;
    }

    let html = extract_part_by_mime(payload, "text/html");
    if !html.is_empty() {
        return strip_html_tags(&html);
    }

    String::new()
}

fn extract_part_by_mime(part: &MessagePart, mime_type: &str) -> String {
    if part
        .mime_type
        .as_deref()
        .is_some_and(|m| m.starts_with(mime_type))
    {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
            if let Some(text) = decode_body_data(data) {
                return text;
            }
        }
    }

    for subpart in part.parts.as_deref().unwrap_or_default() {
        let text = extract_part_by_mime(subpart, mime_type);
        if !text.is_empty() {
            return text;
        }
    }

    String::new()
}

/// Body data is base64url text on the wire; some client versions hand it
/// over already decoded, so plain text passes through unchanged.
fn decode_body_data(data: &[u8]) -> Option<String> {
    let as_str = String::from_utf8_lossy(data);
    let trimmed = as_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| general_purpose::URL_SAFE.decode(trimmed))
        .or_else(|_| general_purpose::STANDARD.decode(trimmed));

    match decoded {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(_) => Some(as_str.into_owned()),
    }
}

/// Minimal HTML-to-text: drop tags, collapse whitespace.
pub fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let mut text = out.replace("\r\n", "\n").replace('\t', " ");
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    while text.contains("\n\n\n") {
        text = text.replace("\n\n\n", "\n\n");
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn query_includes_date_and_folders() {
        let opts = FetchOptions {
            max_results: 100,
            after: Some(Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap()),
            query: String::new(),
            include_sent: true,
        };
        assert_eq!(build_query(&opts), "after:2025/03/05 (in:inbox OR in:sent)");

        let inbox_only = FetchOptions {
            include_sent: false,
            ..opts
        };
        assert_eq!(build_query(&inbox_only), "after:2025/03/05");
    }

    #[test]
    fn custom_query_is_appended() {
        let opts = FetchOptions {
            max_results: 10,
            after: None,
            query: "from:recruiter@acme.com".into(),
            include_sent: false,
        };
        assert_eq!(build_query(&opts), "from:recruiter@acme.com");
    }

    #[test]
    fn parses_rfc2822_dates() {
        let dt = parse_date("Tue, 4 Mar 2025 10:30:00 +0100").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2025-03-04 09:30");

        // Trailing timezone comment
        assert!(parse_date("Mon, 03 Mar 2025 08:00:00 -0500 (EST)").is_some());
        assert!(parse_date("not a date").is_none());
    }

    #[test]
    fn html_stripping_collapses_whitespace() {
        let html = "<div><p>Hello  <b>there</b></p>\r\n\r\n\r\n<p>Bye</p></div>";
        let text = strip_html_tags(html);
        assert!(text.starts_with("Hello there"));
        assert!(!text.contains('<'));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn default_window_is_thirty_days() {
        let opts = FetchOptions::default();
        let after = opts.after.unwrap();
        let delta = Utc::now() - after;
        assert!(delta >= Duration::days(29) && delta <= Duration::days(31));
        assert_eq!(opts.max_results, 100);
    }
}
