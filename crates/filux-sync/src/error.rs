//! Error types for the sync module.
//!
//! [`SyncError`] is fatal to a whole operation. [`ItemError`] is a value
//! recorded in a report for one document or one peer.

use filux_core::{CoreError, ValidationError};
use filux_store::StoreError;
use thiserror::Error;

/// Errors that abort a publish or a follow-sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local persistence or a manifest/pointer push failed.
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// Encoding our own records failed.
    #[error("core error: {0}")]
    CoreError(#[from] CoreError),

    /// The stored manifest belongs to another identity.
    #[error("manifest owner {found} does not match identity {expected}")]
    OwnerMismatch { expected: String, found: String },
}

/// Why one item or one peer failed. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// Address or pointer absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Signature mismatch or malformed signed record.
    #[error("verification failed: {0}")]
    VerificationFailed(#[from] ValidationError),

    /// The content store could not be reached.
    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    /// Bytes did not parse as the expected record.
    #[error("malformed: {0}")]
    Malformed(String),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl ItemError {
    /// Whether the same request may succeed on a later sync.
    pub fn is_transient(&self) -> bool {
        matches!(self, ItemError::NotFound(_) | ItemError::StoreUnavailable(_))
    }
}

impl From<&StoreError> for ItemError {
    fn from(e: &StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) | StoreError::Io(_) => ItemError::StoreUnavailable(e.to_string()),
            StoreError::NotFound(what) => ItemError::NotFound(what.clone()),
            other => ItemError::Store(other.to_string()),
        }
    }
}

impl From<StoreError> for ItemError {
    fn from(e: StoreError) -> Self {
        ItemError::from(&e)
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
