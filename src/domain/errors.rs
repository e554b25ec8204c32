//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. The first four variants
//! are the recoverable taxonomy surfaced to callers with a stable reason
//! code; `Store` is the fatal class (storage gave up mid-operation).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("AI generation failed: {0}")]
    Ai(String),

    #[error("input error: {0}")]
    Input(String),
}

impl DomainError {
    /// Stable machine-checkable reason code for transport layers.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation_error",
            Self::Store(_) => "store_error",
            Self::Ai(_) => "ai_error",
            Self::Input(_) => "input_error",
        }
    }

    /// Whether the caller can retry or correct the request. Store failures
    /// are not recoverable by the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
