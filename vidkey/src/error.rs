//! Errors surfaced to callers of [`Resolver::resolve`](crate::Resolver::resolve).

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;

/// Classified reason a resolution failed.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// One or more identifiers were missing or empty. No upstream call was made.
    #[error("Missing required parameters: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// Upstream answered with a non-2xx status.
    #[error("Upstream api error")]
    Upstream { status: u16, details: Value },

    /// Upstream never answered (refused, reset, timed out).
    #[error("Service unavailable - no response from upstream api")]
    UpstreamUnavailable(String),

    /// Request could not be set up locally.
    #[error("Internal server error")]
    Internal(String),
}

/// A classified failure together with the moment it was produced.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    pub timestamp: DateTime<Utc>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> u16 {
        match &self.kind {
            ErrorKind::Validation { .. } => 400,
            ErrorKind::Upstream { status, .. } => *status,
            ErrorKind::UpstreamUnavailable(_) => 503,
            ErrorKind::Internal(_) => 500,
        }
    }

    pub fn details(&self) -> Value {
        match &self.kind {
            ErrorKind::Validation { missing } => json!(missing),
            ErrorKind::Upstream { details, .. } => details.clone(),
            ErrorKind::UpstreamUnavailable(x) | ErrorKind::Internal(x) => Value::String(x.clone()),
        }
    }

    /// Response body sent back to the caller.
    pub fn to_body(&self) -> Value {
        json!({
            "success": false,
            "error": self.kind.to_string(),
            "status": self.status(),
            "details": self.details(),
            "timestamp": self.timestamp,
        })
    }

    /// Classify a failed `send()` of an outbound request.
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::new(ErrorKind::Internal(e.to_string()))
        } else {
            Self::new(ErrorKind::UpstreamUnavailable(e.to_string()))
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// A `Result` alias where the `Err` case is `vidkey::Error`.
pub type Result<T> = std::result::Result<T, Error>;
