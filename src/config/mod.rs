//! Application configuration
//!
//! Loaded from a TOML file (default `~/.config/jobtrail/config.toml`).
//! Every section has working defaults so a freshly `config init`-ed file
//! runs as-is; validation happens before any I/O so a bad file fails fast.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::JobError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gmail: GmailConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub classifier: ClassifierConfig,
    pub filters: FilterConfig,
    pub tracking: TrackingConfig,
    pub privacy: PrivacyConfig,
    pub mcp: McpConfig,
}

/// Gmail provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// Path to the OAuth client credentials JSON (Desktop app type).
    pub credentials_path: String,
    /// Where the refresh token is persisted after the browser flow.
    pub token_path: String,
    /// Upper bound on messages fetched per sync (1..=5000).
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

/// LLM provider selection for the classification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Primary provider: "ollama" or "openai".
    pub primary: String,
    /// Fallback provider tried on primary failure; empty disables fallback.
    pub fallback: String,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub model: String,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Model name; the API key comes from OPENAI_API_KEY on the service side.
    pub model: String,
}

/// Classification service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub host: String,
    pub port: u16,
    pub cache_enabled: bool,
    pub min_confidence: f64,
}

/// Static filtering rules; learned rules from the database are merged in
/// at sync time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub domain_whitelist: Vec<String>,
    pub domain_blacklist: Vec<String>,
    pub subject_blacklist: Vec<String>,
    pub subject_keywords: Vec<String>,
    pub body_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Days of silence before a conversation is considered stale (>= 1).
    pub stale_after_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Store full bodies (encrypted at rest). Off by default: snippets only.
    pub store_email_body: bool,
    pub encryption_key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub enabled: bool,
    pub transport: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_path: "~/.config/jobtrail/credentials.json".into(),
            token_path: "~/.config/jobtrail/token.json".into(),
            max_results: 100,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/jobtrail/jobtrail.db".into(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary: "ollama".into(),
            fallback: "openai".into(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:1b".into(),
            host: "http://localhost:11434".into(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 8642,
            cache_enabled: true,
            min_confidence: 0.5,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { stale_after_days: 7 }
    }
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            store_email_body: false,
            encryption_key_path: "~/.config/jobtrail/encryption.key".into(),
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport: "stdio".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gmail: GmailConfig::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            classifier: ClassifierConfig::default(),
            filters: FilterConfig {
                domain_whitelist: vec![
                    "greenhouse.io".into(),
                    "lever.co".into(),
                    "ashbyhq.com".into(),
                    "smartrecruiters.com".into(),
                ],
                domain_blacklist: vec![
                    "noreply@linkedin.com".into(),
                    "mailchimp.com".into(),
                    "sendgrid.net".into(),
                ],
                subject_blacklist: vec![
                    "job alert".into(),
                    "new jobs for you".into(),
                    "weekly digest".into(),
                ],
                subject_keywords: vec![
                    "opportunity".into(),
                    "role".into(),
                    "position".into(),
                    "interview".into(),
                    "application".into(),
                    "candidate".into(),
                ],
                body_keywords: vec![
                    "your background".into(),
                    "schedule a call".into(),
                    "interested in".into(),
                    "reaching out".into(),
                    "resume".into(),
                    "experience".into(),
                ],
            },
            tracking: TrackingConfig::default(),
            privacy: PrivacyConfig::default(),
            mcp: McpConfig::default(),
        }
    }
}

impl Config {
    /// Read, parse, and validate the config file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, JobError> {
        let path = expand_path(path.as_ref());

        let data = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                JobError::Config(format!(
                    "config file not found: {} (run 'jobtrail config init' to create it)",
                    path.display()
                ))
            } else {
                JobError::Config(format!("failed to read config: {}", e))
            }
        })?;

        let mut cfg: Config = toml::from_str(&data)?;
        cfg.expand_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Default location: `~/.config/jobtrail/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("jobtrail")
            .join("config.toml")
    }

    /// Base URL of the classification service.
    pub fn classifier_url(&self) -> String {
        format!("{}:{}", self.classifier.host, self.classifier.port)
    }

    /// Expand `~` in every path field.
    fn expand_paths(&mut self) {
        for p in [
            &mut self.gmail.credentials_path,
            &mut self.gmail.token_path,
            &mut self.database.path,
            &mut self.privacy.encryption_key_path,
        ] {
            *p = expand_path(Path::new(p.as_str()))
                .to_string_lossy()
                .into_owned();
        }
    }

    /// Check value ranges before any I/O happens.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.gmail.max_results == 0 || self.gmail.max_results > 5000 {
            return Err(JobError::Config(format!(
                "gmail.max_results must be between 1 and 5000, got {}",
                self.gmail.max_results
            )));
        }

        for (field, value) in [
            ("llm.primary", &self.llm.primary),
            ("llm.fallback", &self.llm.fallback),
        ] {
            if !value.is_empty() && value != "ollama" && value != "openai" {
                return Err(JobError::Config(format!(
                    "{} must be \"ollama\" or \"openai\", got {:?}",
                    field, value
                )));
            }
        }

        if self.classifier.port == 0 {
            return Err(JobError::Config(
                "classifier.port must be between 1 and 65535".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.classifier.min_confidence) {
            return Err(JobError::Config(format!(
                "classifier.min_confidence must be in [0, 1], got {}",
                self.classifier.min_confidence
            )));
        }

        if self.tracking.stale_after_days < 1 {
            return Err(JobError::Config(format!(
                "tracking.stale_after_days must be >= 1, got {}",
                self.tracking.stale_after_days
            )));
        }

        if self.mcp.transport != "stdio" {
            return Err(JobError::Config(format!(
                "mcp.transport: only \"stdio\" is supported, got {:?}",
                self.mcp.transport
            )));
        }

        Ok(())
    }

    /// Create parent directories for the database and token paths.
    pub fn ensure_directories(&self) -> Result<(), JobError> {
        for p in [&self.database.path, &self.gmail.token_path] {
            if let Some(parent) = Path::new(p).parent() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Write a commented default config to `path`, refusing to overwrite.
    pub fn init_at<P: AsRef<Path>>(path: P) -> Result<PathBuf, JobError> {
        let path = expand_path(path.as_ref());
        if path.exists() {
            return Err(JobError::Config(format!(
                "config already exists at {}",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, default_config_toml())?;
        Ok(path)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    path.to_path_buf()
}

/// The file written by `config init`.
fn default_config_toml() -> String {
    let cfg = Config::default();
    let body = toml::to_string_pretty(&cfg).unwrap_or_default();
    format!(
        "# jobtrail configuration\n\
         #\n\
         # Gmail setup:\n\
         #   1. console.cloud.google.com -> create a project, enable the Gmail API\n\
         #   2. Create OAuth credentials (Desktop app) and download the JSON\n\
         #   3. Save it to the credentials_path below\n\n{}",
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.classifier_url(), "http://localhost:8642");
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [gmail]
            max_results = 250

            [tracking]
            stale_after_days = 14
            "#,
        )
        .unwrap();

        assert_eq!(cfg.gmail.max_results, 250);
        assert_eq!(cfg.tracking.stale_after_days, 14);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.llm.primary, "ollama");
        assert!(cfg.classifier.cache_enabled);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.gmail.max_results = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.gmail.max_results = 9000;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracking.stale_after_days = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.llm.primary = "claude".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_config_roundtrips() {
        let text = default_config_toml();
        let cfg: Config = toml::from_str(&text).unwrap();
        assert!(cfg.validate().is_ok());
    }
}
