//! Error types for filux core.

use thiserror::Error;

use crate::types::DocumentId;

/// Core errors that can occur while building, encoding or looking up records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            CoreError::EncodingError(e.to_string())
        } else {
            CoreError::DecodingError(e.to_string())
        }
    }
}

/// Reasons a document, profile or manifest fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("manifest is unsigned")]
    Unsigned,

    #[error("id mismatch: claimed {claimed}, derived {derived}")]
    IdMismatch {
        claimed: DocumentId,
        derived: DocumentId,
    },

    #[error("author mismatch: expected {expected}, got {got}")]
    AuthorMismatch { expected: String, got: String },

    #[error("content exceeds {max} bytes ({len})")]
    ContentTooLarge { len: usize, max: usize },

    #[error("too many participants: {0}")]
    TooManyParticipants(usize),

    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),

    #[error("{kind} requires reply_to")]
    MissingReplyTo { kind: &'static str },

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            other => ValidationError::StructuralError(other.to_string()),
        }
    }
}
