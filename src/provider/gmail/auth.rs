//! Gmail OAuth: installed-app flow with tokens persisted to disk.

use std::path::Path;
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::{
    read_application_secret, ApplicationSecret, InstalledFlowAuthenticator,
    InstalledFlowReturnMethod,
};

use crate::error::JobError;

/// Read-only access is all the tracker needs.
pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

/// Upper bound on the interactive browser handoff.
pub const AUTH_FLOW_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub type GmailAuthenticator = Authenticator<HttpsConnector<HttpConnector>>;

/// Load the OAuth client secret, with setup instructions on failure.
pub async fn load_secret(credentials_path: &str) -> Result<ApplicationSecret, JobError> {
    read_application_secret(credentials_path).await.map_err(|e| {
        JobError::Auth(format!(
            "failed to read credentials file {}: {}\n\n\
             To set up Gmail access:\n\
             1. Go to https://console.cloud.google.com/ and enable the Gmail API\n\
             2. Create OAuth 2.0 credentials (Desktop app)\n\
             3. Download the JSON to the path above",
            credentials_path, e
        ))
    })
}

/// Build the authenticator. A cached refresh token at `token_path` is
/// reused; otherwise the first token request opens a local redirect flow
/// in the browser.
pub async fn build_authenticator(
    secret: ApplicationSecret,
    token_path: &str,
) -> Result<GmailAuthenticator, JobError> {
    if let Some(parent) = Path::new(token_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(token_path)
        .build()
        .await
        .map_err(|e| JobError::Auth(format!("failed to build authenticator: {}", e)))
}

/// Whether a persisted token exists; cheap pre-check used by
/// `is_authenticated`.
pub fn has_cached_token(token_path: &str) -> bool {
    Path::new(token_path).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_token_check_is_just_a_file_probe() {
        assert!(!has_cached_token("/definitely/not/a/real/token.json"));
    }
}
