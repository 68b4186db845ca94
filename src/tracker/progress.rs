//! Sync progress reporting.

use std::sync::Arc;

/// Pipeline stage currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Listing,
    Fetching,
    Filtering,
    Classifying,
    Validating,
    Processing,
    UpdatingStatus,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Fetching => "fetching",
            Self::Filtering => "filtering",
            Self::Classifying => "classifying",
            Self::Validating => "validating",
            Self::Processing => "processing",
            Self::UpdatingStatus => "updating_status",
        }
    }
}

/// A monotonically advancing (phase, current, total) snapshot. Consumers
/// reset their ETA clock on phase transitions.
#[derive(Debug, Clone)]
pub struct Progress {
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub description: &'static str,
}

/// Invoked from concurrent tasks; implementations must be thread-safe.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;
