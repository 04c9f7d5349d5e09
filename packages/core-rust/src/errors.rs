//! Shared error taxonomy for the offline sync core.

use thiserror::Error;

/// Errors that can arise from domain-level operations shared across the agent.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    #[error("durable storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
