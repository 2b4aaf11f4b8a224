// backend/src/error.rs

use serde::Serialize;
use thiserror::Error;

/// Every failure the core can surface. Only the HTTP boundary turns these
/// into status codes (see `routes::ApiError`).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    InvalidFilter(String),

    #[error("assignment {index}: {reason}")]
    InvalidAssignment { index: usize, reason: String },

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invariant(String),

    #[error("{0}")]
    Conflict(String),

    #[error("deadline exceeded after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u128 },

    #[error("storage error: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn assignment(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidAssignment { index, reason: reason.into() }
    }

    /// Envelope `kind`. `InvalidAssignment` is a malformed input from the
    /// caller's point of view and is reported as `InvalidFilter`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFilter(_) | Self::InvalidAssignment { .. } => "InvalidFilter",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::NotFound(_) => "NotFound",
            Self::Invariant(_) => "InvariantError",
            Self::Conflict(_) => "Conflict",
            Self::Timeout { .. } => "Timeout",
            Self::Storage(_) => "StorageError",
        }
    }

    /// Transient failures the planner may retry once.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Storage(_))
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let details = match self {
            Self::InvalidAssignment { index, .. } => Some(serde_json::json!({ "index": index })),
            Self::Timeout { elapsed_ms } => Some(serde_json::json!({ "elapsed_ms": elapsed_ms })),
            _ => None,
        };
        ErrorEnvelope {
            kind: self.kind(),
            message: self.to_string(),
            details,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".into()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation, serialization_failure, deadlock_detected
                Some("23505") | Some("40001") | Some("40P01") => Self::Conflict(db.message().to_string()),
                _ => Self::Storage(e.to_string()),
            },
            _ => Self::Storage(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
