//! Error types shared across the coordination substrate.
//!
//! [`CoreError`] covers every failure mode surfaced by the message bus,
//! task manager, delegation engine, retrieval index, and request
//! coordinator. Every public operation returns [`CoreResult<T>`] — none
//! of these components panic across their public boundary.

use crate::logging::{log_error, log_warn};
use thiserror::Error;

/// High-level routing category for a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input or a rejected state transition. Caller's mistake.
    Validation,
    /// A referenced id does not exist.
    NotFound,
    /// The requested mutation conflicts with current state (cycle, duplicate, bad transition).
    Conflict,
    /// A backing collaborator (embedding/LLM backend) failed transiently. Retry with backoff.
    Transient,
    /// Persistence or invariant failure. The component should report itself degraded.
    Fatal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("transient failure: {message}")]
    Transient { message: String },

    #[error("fatal: {message}")]
    Fatal { message: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Transient { .. } => ErrorCategory::Transient,
            Self::Fatal { .. } => ErrorCategory::Fatal,
        }
    }

    /// Whether a caller should retry this operation (with backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(%message, "validation error");
        Self::Validation { message }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(%message, "conflict error");
        Self::Conflict { message }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(%message, "transient error");
        Self::Transient { message }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(%message, "fatal error");
        Self::Fatal { message }
    }
}

impl serde::Serialize for CoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CoreError", 2)?;
        let kind = match self.category() {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Fatal => "fatal",
        };
        state.serialize_field("kind", kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
