//! Error types for bugbridge
//!
//! Two layers:
//! - [`TrackerError`]: failures surfaced by the Bugzilla/Jira collaborators.
//!   These are the "transport errors" of a pipeline run and carry a retry
//!   classification for the transport layer.
//! - [`BridgeError`]: everything else the crate can fail with, wrapping
//!   tracker errors when they escape a step.

use crate::integrations::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for bugbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Which external tracker an error or call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracker {
    Bugzilla,
    Jira,
}

impl Tracker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tracker::Bugzilla => "bugzilla",
            Tracker::Jira => "jira",
        }
    }
}

impl std::fmt::Display for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by tracker clients
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{tracker} authentication failed: {message}")]
    Auth { tracker: Tracker, message: String },

    #[error("{tracker} resource not found: {resource}")]
    NotFound { tracker: Tracker, resource: String },

    #[error("{tracker} rate limited, retry after {retry_after} seconds")]
    RateLimited { tracker: Tracker, retry_after: u64 },

    #[error("{tracker} API error: HTTP {status}: {body}")]
    Api {
        tracker: Tracker,
        status: u16,
        body: String,
    },

    #[error("{tracker} returned an unexpected response: {message}")]
    Malformed { tracker: Tracker, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl TrackerError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerError::Auth { .. } => "auth",
            TrackerError::NotFound { .. } => "not_found",
            TrackerError::RateLimited { .. } => "rate_limited",
            TrackerError::Api { .. } => "api",
            TrackerError::Malformed { .. } => "malformed",
            TrackerError::Network(_) => "network",
        }
    }
}

impl RetryableError for TrackerError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            TrackerError::RateLimited { retry_after, .. } => {
                RetryDecision::RetryAfter(Duration::from_secs(*retry_after))
            }
            TrackerError::Api { status, .. } => match status {
                500..=599 => RetryDecision::Retry,
                _ => RetryDecision::NoRetry,
            },
            TrackerError::Network(e) => {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
                        500..=599 => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else {
                    RetryDecision::NoRetry
                }
            }
            TrackerError::Auth { .. } => RetryDecision::NoRetry,
            TrackerError::NotFound { .. } => RetryDecision::NoRetry,
            TrackerError::Malformed { .. } => RetryDecision::NoRetry,
        }
    }
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration errors (unknown step, malformed map, missing file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracker transport errors
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// A step was run without the state it requires
    #[error("Step `{step}` cannot run: {reason}")]
    StepPrecondition { step: &'static str, reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    /// Whether this error came from one of the external trackers
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Tracker(_) | BridgeError::Http(_))
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::Tracker(e) => e.kind(),
            BridgeError::StepPrecondition { .. } => "precondition",
            BridgeError::Io(_) => "io",
            BridgeError::Json(_) => "json",
            BridgeError::Yaml(_) => "yaml",
            BridgeError::Http(_) => "http",
            BridgeError::Other(_) => "other",
        }
    }
}
