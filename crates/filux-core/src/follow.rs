//! Follow relationships.

use serde::{Deserialize, Serialize};

use crate::crypto::Ed25519PublicKey;
use crate::types::{ContentAddress, PointerName};
use crate::version::ManifestVersion;

/// A followed identity, keyed by `pubkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEntry {
    /// Name the follower knows this identity by. Advisory only.
    pub display_name: String,
    pub pubkey: Ed25519PublicKey,
    /// Version of the last manifest merged into the cache; `None` means
    /// nothing merged yet.
    #[serde(default)]
    pub last_known_manifest_version: Option<ManifestVersion>,
    /// Manifest address the pointer last resolved to.
    #[serde(default)]
    pub last_known_pointer: Option<ContentAddress>,
    pub followed_at: i64,
}

impl FollowEntry {
    pub fn new(display_name: impl Into<String>, pubkey: Ed25519PublicKey, followed_at: i64) -> Self {
        Self {
            display_name: display_name.into(),
            pubkey,
            last_known_manifest_version: None,
            last_known_pointer: None,
            followed_at,
        }
    }

    /// Pointer this identity publishes under.
    pub fn pointer(&self) -> PointerName {
        PointerName::for_identity(&self.pubkey)
    }

    /// Whether `version` is newer than anything merged so far.
    pub fn is_newer(&self, version: &ManifestVersion) -> bool {
        match &self.last_known_manifest_version {
            Some(known) => version > known,
            None => true,
        }
    }

    /// Forget sync progress so the next sync refetches everything.
    pub fn reset(&mut self) {
        self.last_known_manifest_version = None;
        self.last_known_pointer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer() {
        let mut entry = FollowEntry::new("bob", Ed25519PublicKey::from_bytes([5; 32]), 0);
        assert!(entry.is_newer(&ManifestVersion::ZERO));

        entry.last_known_manifest_version = Some(ManifestVersion::new(0, 0, 0, 4));
        assert!(!entry.is_newer(&ManifestVersion::new(0, 0, 0, 4)));
        assert!(!entry.is_newer(&ManifestVersion::new(0, 0, 0, 3)));
        assert!(entry.is_newer(&ManifestVersion::new(0, 0, 0, 5)));

        entry.reset();
        assert!(entry.is_newer(&ManifestVersion::ZERO));
    }
}
