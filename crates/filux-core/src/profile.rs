//! Signed profile record.

use serde::{Deserialize, Serialize};

use crate::canonical::profile_signing_bytes;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature};
use crate::error::{CoreError, ValidationError};
use crate::id::profile_id;
use crate::identity::Identity;
use crate::types::{DocumentId, PointerName};

/// An identity's public profile.
///
/// Unlike posts, a profile changes over time; it keeps the stable id
/// [`profile_id`] so its manifest entry is updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub pubkey: Ed25519PublicKey,
    /// Current display name.
    pub author: String,
    #[serde(default)]
    pub bio: String,
    /// Where peers resolve this identity's manifest.
    pub pointer: PointerName,
    pub updated_at: i64,
    pub signature: Ed25519Signature,
}

impl Profile {
    /// Create and sign a profile for `identity`.
    pub fn signed(identity: &Identity, bio: impl Into<String>, updated_at: i64) -> Self {
        let mut profile = Self {
            pubkey: identity.pubkey(),
            author: identity.display_name().to_string(),
            bio: bio.into(),
            pointer: identity.pointer(),
            updated_at,
            signature: Ed25519Signature::ZERO,
        };
        profile.signature = identity.keypair().sign(&profile_signing_bytes(&profile));
        profile
    }

    /// Manifest id of this profile.
    pub fn id(&self) -> DocumentId {
        profile_id(&self.pubkey)
    }

    /// Check the signature against `pubkey`.
    pub fn verify(&self) -> Result<(), ValidationError> {
        self.pubkey
            .verify(&profile_signing_bytes(self), &self.signature)
            .map_err(|_| ValidationError::SignatureFailed)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}
