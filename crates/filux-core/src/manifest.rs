//! The manifest: a versioned, ordered index of an identity's publishable
//! records.
//!
//! Entries map stable [`DocumentId`]s to their current [`ContentAddress`].
//! There is at most one entry per id, and entries keep insertion order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::canonical::manifest_signing_bytes;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::document::DocumentKind;
use crate::error::{CoreError, ValidationError};
use crate::types::{ContentAddress, DocumentId};
use crate::version::ManifestVersion;

/// What a manifest entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Post,
    Reaction,
    Repost,
    ThreadRoot,
    ThreadManifest,
    Profile,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Reaction => "reaction",
            Self::Repost => "repost",
            Self::ThreadRoot => "thread_root",
            Self::ThreadManifest => "thread_manifest",
            Self::Profile => "profile",
        }
    }

    /// Whether the entry holds a signed [`crate::Document`].
    pub fn is_document(self) -> bool {
        matches!(
            self,
            Self::Post | Self::Reaction | Self::Repost | Self::ThreadRoot
        )
    }
}

impl From<DocumentKind> for EntryKind {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Post => Self::Post,
            DocumentKind::Reaction => Self::Reaction,
            DocumentKind::Repost => Self::Repost,
            DocumentKind::ThreadRoot => Self::ThreadRoot,
        }
    }
}

/// One record in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: DocumentId,
    /// Absent until the first successful publish.
    #[serde(default)]
    pub address: Option<ContentAddress>,
    pub kind: EntryKind,
    /// When the record was created (Unix ms).
    pub added_at: i64,
}

/// Change to an entry produced by [`Manifest::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    Added,
    AddressChanged,
    Unchanged,
}

/// A signed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub owner_pubkey: Ed25519PublicKey,
    pub entries: Vec<ManifestEntry>,
    pub manifest_version: ManifestVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Ed25519Signature>,
}

impl Manifest {
    /// An empty manifest at version `0.0.0.0`.
    pub fn new(owner: Ed25519PublicKey) -> Self {
        Self {
            owner_pubkey: owner,
            entries: Vec::new(),
            manifest_version: ManifestVersion::ZERO,
            signature: None,
        }
    }

    /// Find the entry for `id`.
    pub fn entry(&self, id: &DocumentId) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Current address of `id`, if published.
    pub fn address_of(&self, id: &DocumentId) -> Option<&ContentAddress> {
        self.entry(id).and_then(|e| e.address.as_ref())
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.entry(id).is_some()
    }

    /// Record that `id` now lives at `address`.
    ///
    /// New ids append; known ids keep their position and original `added_at`.
    pub fn record(
        &mut self,
        id: DocumentId,
        address: ContentAddress,
        kind: EntryKind,
        added_at: i64,
    ) -> EntryChange {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            if entry.address.as_ref() == Some(&address) {
                return EntryChange::Unchanged;
            }
            entry.address = Some(address);
            return EntryChange::AddressChanged;
        }

        self.entries.push(ManifestEntry {
            id,
            address: Some(address),
            kind,
            added_at,
        });
        EntryChange::Added
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.id != id);
        self.entries.len() != before
    }

    /// Advance the version by one build. Invalidates the signature.
    ///
    /// Returns `false` when the version is saturated and did not move.
    pub fn bump_version(&mut self) -> bool {
        self.signature = None;
        self.manifest_version.bump()
    }

    /// Entries of `self` that `cached` lacks at the same address.
    ///
    /// Entries without an address are never reported: there is nothing to
    /// fetch yet.
    pub fn missing_from<'a>(&'a self, cached: &[ManifestEntry]) -> Vec<&'a ManifestEntry> {
        let known: HashMap<&DocumentId, Option<&ContentAddress>> =
            cached.iter().map(|e| (&e.id, e.address.as_ref())).collect();

        self.entries
            .iter()
            .filter(|e| e.address.is_some())
            .filter(|e| known.get(&e.id).copied().flatten() != e.address.as_ref())
            .collect()
    }

    /// Whether `self` has caught up with `other` (same owner).
    ///
    /// Caught up means a version `>=` the other's and a superset of its
    /// entry ids.
    pub fn is_caught_up_with(&self, other: &Manifest) -> bool {
        self.owner_pubkey == other.owner_pubkey
            && self.manifest_version >= other.manifest_version
            && other.entries.iter().all(|e| self.contains(&e.id))
    }

    /// Sign with the owner's keypair.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), CoreError> {
        if keypair.public_key() != self.owner_pubkey {
            return Err(CoreError::InvalidPublicKey);
        }
        self.signature = Some(keypair.sign(&manifest_signing_bytes(self)));
        Ok(())
    }

    /// Check the owner's signature.
    pub fn verify(&self) -> Result<(), ValidationError> {
        let signature = self.signature.as_ref().ok_or(ValidationError::Unsigned)?;
        self.owner_pubkey
            .verify(&manifest_signing_bytes(self), signature)
            .map_err(|_| ValidationError::SignatureFailed)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Keypair {
        Keypair::from_seed(&[0x11; 32])
    }

    fn id(n: u8) -> DocumentId {
        DocumentId::from_bytes([n; 16])
    }

    fn addr(s: &str) -> ContentAddress {
        ContentAddress::mock_for(s.as_bytes())
    }

    #[test]
    fn test_new_manifest_starts_at_zero() {
        let m = Manifest::new(owner().public_key());
        assert_eq!(m.manifest_version, ManifestVersion::ZERO);
        assert!(m.entries.is_empty());
    }

    #[test]
    fn test_record_keeps_one_entry_per_id() {
        let mut m = Manifest::new(owner().public_key());
        assert_eq!(m.record(id(1), addr("a"), EntryKind::Post, 10), EntryChange::Added);
        assert_eq!(m.record(id(2), addr("b"), EntryKind::Post, 20), EntryChange::Added);
        assert_eq!(m.record(id(1), addr("a"), EntryKind::Post, 30), EntryChange::Unchanged);
        assert_eq!(
            m.record(id(1), addr("a2"), EntryKind::Post, 40),
            EntryChange::AddressChanged
        );

        assert_eq!(m.entries.len(), 2);
        assert_eq!(m.entries[0].id, id(1));
        assert_eq!(m.entries[0].added_at, 10);
        assert_eq!(m.address_of(&id(1)), Some(&addr("a2")));
    }

    #[test]
    fn test_remove() {
        let mut m = Manifest::new(owner().public_key());
        m.record(id(1), addr("a"), EntryKind::Post, 1);
        assert!(m.remove(&id(1)));
        assert!(!m.remove(&id(1)));
        assert!(m.entries.is_empty());
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = owner();
        let mut m = Manifest::new(kp.public_key());
        m.record(id(1), addr("a"), EntryKind::Post, 1);
        m.bump_version();
        m.sign(&kp).unwrap();
        assert!(m.verify().is_ok());

        let mut forged = m.clone();
        forged.manifest_version.bump();
        assert_eq!(forged.verify(), Err(ValidationError::SignatureFailed));

        let mut retargeted = m.clone();
        retargeted.entries[0].address = Some(addr("evil"));
        assert_eq!(retargeted.verify(), Err(ValidationError::SignatureFailed));
    }

    #[test]
    fn test_unsigned_and_wrong_signer() {
        let kp = owner();
        let mut m = Manifest::new(kp.public_key());
        assert_eq!(m.verify(), Err(ValidationError::Unsigned));

        let stranger = Keypair::from_seed(&[0x22; 32]);
        assert!(m.sign(&stranger).is_err());

        m.sign(&kp).unwrap();
        m.bump_version();
        assert_eq!(m.verify(), Err(ValidationError::Unsigned));
    }

    #[test]
    fn test_missing_from_detects_new_and_moved_entries() {
        let mut remote = Manifest::new(owner().public_key());
        remote.record(id(1), addr("a"), EntryKind::Post, 1);
        remote.record(id(2), addr("b"), EntryKind::Post, 2);
        remote.record(id(3), addr("c"), EntryKind::Profile, 3);
        remote.entries.push(ManifestEntry {
            id: id(4),
            address: None,
            kind: EntryKind::Post,
            added_at: 4,
        });

        let mut cached = remote.entries[..3].to_vec();
        cached.remove(1);
        cached[1].address = Some(addr("c-old"));

        let missing: Vec<DocumentId> = remote.missing_from(&cached).iter().map(|e| e.id).collect();
        assert_eq!(missing, vec![id(2), id(3)]);
    }

    #[test]
    fn test_caught_up() {
        let kp = owner();
        let mut older = Manifest::new(kp.public_key());
        older.record(id(1), addr("a"), EntryKind::Post, 1);
        older.bump_version();

        let mut newer = older.clone();
        newer.record(id(2), addr("b"), EntryKind::Post, 2);
        newer.bump_version();

        assert!(newer.is_caught_up_with(&older));
        assert!(!older.is_caught_up_with(&newer));
        assert!(newer.is_caught_up_with(&newer));
    }

    #[test]
    fn test_json_shape() {
        let kp = owner();
        let mut m = Manifest::new(kp.public_key());
        m.record(id(1), addr("a"), EntryKind::ThreadManifest, 5);
        m.bump_version();
        m.sign(&kp).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&m.to_json().unwrap()).unwrap();
        assert_eq!(value["manifest_version"], "0.0.0.1");
        assert_eq!(value["owner_pubkey"], kp.public_key().to_hex());
        assert_eq!(value["entries"][0]["kind"], "thread_manifest");
        assert_eq!(value["entries"][0]["added_at"], 5);

        let parsed = Manifest::from_json(&m.to_json().unwrap()).unwrap();
        assert!(parsed.verify().is_ok());
    }
}
