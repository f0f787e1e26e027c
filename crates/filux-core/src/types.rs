//! Strong type definitions for filux.
//!
//! Identifiers and addresses live in separate key spaces: a [`DocumentId`] is
//! derived once from authorship metadata, a [`ContentAddress`] is wherever the
//! content store put the bytes. The two are joined only through a manifest.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{decode_fixed, hex_serde, Blake3Hash, Ed25519PublicKey};

/// Length of a document id in bytes (rendered as 32 hex characters).
pub const DOCUMENT_ID_LEN: usize = 16;

/// A 16-byte document identifier, stable for the lifetime of the document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub [u8; DOCUMENT_ID_LEN]);

impl DocumentId {
    /// Create a new DocumentId from raw bytes.
    pub const fn from_bytes(bytes: [u8; DOCUMENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Take the leading bytes of a hash.
    pub fn from_hash(hash: &Blake3Hash) -> Self {
        let mut arr = [0u8; DOCUMENT_ID_LEN];
        arr.copy_from_slice(&hash.0[..DOCUMENT_ID_LEN]);
        Self(arr)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; DOCUMENT_ID_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_fixed(s).map(Self)
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for DocumentId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DocumentId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; DOCUMENT_ID_LEN] = slice.try_into()?;
        Ok(Self(arr))
    }
}

hex_serde!(DocumentId);

/// Prefix of addresses in the local-only mock address space.
pub const MOCK_ADDRESS_PREFIX: &str = "bafk";

/// An address in the content store.
///
/// Opaque to filux: whatever string the store returned from `add`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Wrap an address returned by a content store.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The mock address of `bytes`: derived from their own hash.
    pub fn mock_for(bytes: &[u8]) -> Self {
        Self(format!("{}{}", MOCK_ADDRESS_PREFIX, Blake3Hash::hash(bytes).to_hex()))
    }

    /// Whether this address belongs to the mock address space.
    pub fn is_mock(&self) -> bool {
        self.0.starts_with(MOCK_ADDRESS_PREFIX)
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Peer-supplied, so cut on a char boundary.
        let shown = self
            .0
            .char_indices()
            .nth(20)
            .map_or(self.0.as_str(), |(end, _)| &self.0[..end]);
        write!(f, "ContentAddress({})", shown)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Domain separator for pointer names.
const POINTER_DOMAIN: &[u8] = b"filux-pointer-v0:";

/// A mutable pointer name: re-resolvable to an identity's latest manifest.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointerName(String);

impl PointerName {
    /// Wrap an existing pointer name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the pointer name owned by an identity.
    pub fn for_identity(pubkey: &Ed25519PublicKey) -> Self {
        let hash = Blake3Hash::hash_with_domain(POINTER_DOMAIN, pubkey.as_bytes());
        Self(format!("k51{}", &hash.to_hex()[..40]))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PointerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PointerName({})", self.0)
    }
}

impl fmt::Display for PointerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
