//! Domain pattern matching and the domain-to-company heuristic.

/// ATS providers whose domains are shared across unrelated employers.
/// The bare domain is not a useful company name for these.
const ATS_DOMAINS: &[&str] = &[
    "greenhouse",
    "lever",
    "ashbyhq",
    "smartrecruiters",
    "workday",
    "myworkdayjobs",
    "icims",
    "taleo",
    "jobvite",
    "breezy",
];

/// Match a whitelist/blacklist pattern against a domain or full address.
///
/// Supported forms, all case-insensitive (inputs are pre-lowercased):
/// - exact domain (`acme.com`)
/// - dotted-suffix, so `acme.com` also matches `mail.acme.com`
/// - full address (`jane@acme.com`) or address prefix (`noreply@`)
/// - bare token substring (`greenhouse` matches `greenhouse.io`)
pub fn matches_domain_pattern(domain: &str, full_email: &str, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();

    if domain == pattern {
        return true;
    }

    if domain.ends_with(&format!(".{}", pattern)) {
        return true;
    }

    if pattern.contains('@') {
        if full_email == pattern {
            return true;
        }
        if pattern.ends_with('@') && full_email.starts_with(&pattern) {
            return true;
        }
        return false;
    }

    !pattern.is_empty() && domain.contains(pattern.trim_end_matches('.'))
}

/// Derive a display company name from a sender domain.
///
/// Returns an empty string for ATS domains: there the real company name
/// has to come from the message content.
pub fn company_from_domain(domain: &str) -> String {
    const SUFFIXES: &[&str] = &[
        ".com", ".io", ".co", ".net", ".org", ".ai", ".app", ".jobs", ".careers", ".work", ".hire",
    ];
    const PREFIXES: &[&str] = &[
        "mail.",
        "email.",
        "jobs.",
        "careers.",
        "recruiting.",
        "talent.",
        "hr.",
        "hire.",
        "apply.",
        "www.",
    ];

    let mut name = domain.to_lowercase();
    for suffix in SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    for prefix in PREFIXES {
        if let Some(stripped) = name.strip_prefix(prefix) {
            name = stripped.to_string();
        }
    }

    if ATS_DOMAINS.contains(&name.as_str()) {
        return String::new();
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_suffix_match() {
        assert!(matches_domain_pattern("acme.com", "x@acme.com", "acme.com"));
        assert!(matches_domain_pattern("mail.acme.com", "x@mail.acme.com", "acme.com"));
        assert!(!matches_domain_pattern("notacme.org", "x@notacme.org", "acme.com"));
    }

    #[test]
    fn email_patterns() {
        assert!(matches_domain_pattern(
            "linkedin.com",
            "noreply@linkedin.com",
            "noreply@linkedin.com"
        ));
        // prefix form: "noreply@" matches any noreply sender
        assert!(matches_domain_pattern("foo.com", "noreply@foo.com", "noreply@"));
        assert!(!matches_domain_pattern("foo.com", "jane@foo.com", "noreply@"));
    }

    #[test]
    fn bare_token_is_substring() {
        assert!(matches_domain_pattern("greenhouse.io", "x@greenhouse.io", "greenhouse"));
        assert!(!matches_domain_pattern("acme.com", "x@acme.com", "greenhouse"));
    }

    #[test]
    fn patterns_are_case_insensitive() {
        assert!(matches_domain_pattern("acme.com", "x@acme.com", "ACME.COM"));
    }

    #[test]
    fn company_name_strips_affixes() {
        assert_eq!(company_from_domain("acme.com"), "Acme");
        assert_eq!(company_from_domain("jobs.initech.io"), "Initech");
        assert_eq!(company_from_domain("mail.globex.co"), "Globex");
    }

    #[test]
    fn ats_domains_yield_empty() {
        assert_eq!(company_from_domain("greenhouse.io"), "");
        assert_eq!(company_from_domain("lever.co"), "");
        assert_eq!(company_from_domain("myworkdayjobs.com"), "");
    }
}
