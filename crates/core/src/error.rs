//! Engine error model.

use thiserror::Error;

/// Result type used across the engine and its callers.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure taxonomy for the stock/order engine.
///
/// Business failures (`InsufficientStock`, `InvalidTransition`, `Conflict`,
/// `Validation`) are deterministic: retrying them yields the same outcome.
/// `Transient` covers lock-wait and serialization contention; every attempt
/// is all-or-nothing, so callers may retry it with backoff. `Storage` is a
/// fatal storage fault and must never be conflated with a duplicate key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The referenced product or order does not exist.
    #[error("not found")]
    NotFound,

    /// The product's stock cannot cover the requested quantity.
    #[error("insufficient stock")]
    InsufficientStock,

    /// The requested status change is not in the transition table.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A value failed validation (e.g. non-positive price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness constraint was violated (e.g. duplicate SKU).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Lock-wait or serialization contention; safe to retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Unrecoverable storage failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether a caller may retry the failed operation.
    ///
    /// Only contention-class failures qualify; business failures are
    /// deterministic and retrying them is always wrong.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
