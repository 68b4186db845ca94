use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type shared across the crate.
///
/// Variants mirror the failure dispositions of the pipeline: `Config` and
/// `Auth` are fatal for the command, `Provider` is fatal for a sync,
/// per-item failures (`Classify`, `Validate`) are collected as warnings and
/// the run continues.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Classification failed: {0}")]
    Classify(String),

    #[error("Validation failed: {0}")]
    Validate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for JobError {
    fn from(err: rusqlite::Error) -> Self {
        JobError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for JobError {
    fn from(err: r2d2::Error) -> Self {
        JobError::Database(err.to_string())
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for JobError {
    fn from(err: toml::de::Error) -> Self {
        JobError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::Other(err.to_string())
    }
}
