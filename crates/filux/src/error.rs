//! Error types for the node.

use filux_core::{CoreError, ValidationError};
use filux_store::StoreError;
use filux_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The local store holds no identity yet.
    #[error("no identity initialized")]
    NotInitialized,

    /// `init` on a store that already holds an identity.
    #[error("identity already initialized")]
    AlreadyInitialized,

    #[error("cannot follow yourself")]
    FollowSelf,

    /// A record the operation requires is absent.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
