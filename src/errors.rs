//! Typed error surface for the control core.

use thiserror::Error;

/// The five error kinds the core produces. Event-bus handlers and the tick
/// loop catch and count failures instead of propagating them; this type is
/// for the synchronous, caller-facing API surface (use-case services,
/// repository calls, scheduler operations).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
