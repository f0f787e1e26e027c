//! Per-peer read cache.
//!
//! Holds the subset of a followed identity's manifest that has been fetched
//! and checked, plus the documents themselves. Owned by the local process
//! and never republished.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::Ed25519PublicKey;
use crate::document::Document;
use crate::manifest::{Manifest, ManifestEntry};
use crate::profile::Profile;
use crate::types::{ContentAddress, DocumentId};
use crate::version::ManifestVersion;

/// A fetched document and how far it can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub document: Document,
    pub address: ContentAddress,
    /// False only when cached under an explicit allow-unverified request.
    pub verified: bool,
    pub fetched_at: i64,
}

/// Cache of one followed identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCache {
    pub owner: Ed25519PublicKey,
    /// Version of the manifest this cache was last refreshed from.
    pub manifest_version: Option<ManifestVersion>,
    /// Entries held locally, in the peer's manifest order.
    pub entries: Vec<ManifestEntry>,
    pub documents: BTreeMap<DocumentId, CachedDocument>,
    pub profile: Option<Profile>,
    pub refreshed_at: i64,
}

impl LocalCache {
    pub fn new(owner: Ed25519PublicKey) -> Self {
        Self {
            owner,
            manifest_version: None,
            entries: Vec::new(),
            documents: BTreeMap::new(),
            profile: None,
            refreshed_at: 0,
        }
    }

    /// Entries of `manifest` not yet held at their current address.
    pub fn missing_entries(&self, manifest: &Manifest) -> Vec<ManifestEntry> {
        manifest
            .missing_from(&self.entries)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Mark `entry` as held.
    pub fn hold(&mut self, entry: ManifestEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Store a fetched document under its entry.
    pub fn insert_document(
        &mut self,
        entry: ManifestEntry,
        document: Document,
        verified: bool,
        fetched_at: i64,
    ) {
        if let Some(address) = entry.address.clone() {
            self.documents.insert(
                entry.id,
                CachedDocument {
                    document,
                    address,
                    verified,
                    fetched_at,
                },
            );
            self.hold(entry);
        }
    }

    /// Drop everything the peer no longer lists. Returns the dropped ids.
    pub fn prune_to(&mut self, manifest: &Manifest) -> Vec<DocumentId> {
        let mut dropped = Vec::new();
        self.entries.retain(|e| {
            let keep = manifest.contains(&e.id);
            if !keep {
                dropped.push(e.id);
            }
            keep
        });
        for id in &dropped {
            self.documents.remove(id);
        }

        // Restore the peer's ordering.
        let order: BTreeMap<DocumentId, usize> = manifest
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
        self.entries
            .sort_by_key(|e| order.get(&e.id).copied().unwrap_or(usize::MAX));
        dropped
    }

    /// Documents that passed verification.
    pub fn verified_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents
            .values()
            .filter(|c| c.verified)
            .map(|c| &c.document)
    }

    /// Display name from the cached profile, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.author.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::document::DocumentBuilder;
    use crate::manifest::EntryKind;

    fn setup() -> (Keypair, Document, Document, Manifest) {
        let kp = Keypair::from_seed(&[0x33; 32]);
        let one = DocumentBuilder::new(kp.public_key(), "bob").timestamp(1).content("one").sign(&kp);
        let two = DocumentBuilder::new(kp.public_key(), "bob").timestamp(2).content("two").sign(&kp);
        let mut manifest = Manifest::new(kp.public_key());
        manifest.record(one.id, ContentAddress::mock_for(b"one"), EntryKind::Post, 1);
        manifest.record(two.id, ContentAddress::mock_for(b"two"), EntryKind::Post, 2);
        (kp, one, two, manifest)
    }

    #[test]
    fn test_missing_shrinks_as_documents_arrive() {
        let (kp, one, two, manifest) = setup();
        let mut cache = LocalCache::new(kp.public_key());
        assert_eq!(cache.missing_entries(&manifest).len(), 2);

        let entry = manifest.entry(&one.id).unwrap().clone();
        cache.insert_document(entry, one, true, 5);
        let missing = cache.missing_entries(&manifest);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, two.id);
    }

    #[test]
    fn test_prune_drops_removed_entries() {
        let (kp, one, two, mut manifest) = setup();
        let mut cache = LocalCache::new(kp.public_key());
        for doc in [two.clone(), one.clone()] {
            let entry = manifest.entry(&doc.id).unwrap().clone();
            cache.insert_document(entry, doc, true, 5);
        }
        assert_eq!(cache.entries[0].id, two.id);

        manifest.remove(&two.id);
        let dropped = cache.prune_to(&manifest);
        assert_eq!(dropped, vec![two.id]);
        assert_eq!(cache.entries.len(), 1);
        assert_eq!(cache.entries[0].id, one.id);
        assert!(!cache.documents.contains_key(&two.id));
    }

    #[test]
    fn test_unverified_documents_are_filtered() {
        let (kp, one, two, manifest) = setup();
        let mut cache = LocalCache::new(kp.public_key());
        cache.insert_document(manifest.entry(&one.id).unwrap().clone(), one.clone(), true, 1);
        cache.insert_document(manifest.entry(&two.id).unwrap().clone(), two, false, 1);

        let verified: Vec<&Document> = cache.verified_documents().collect();
        assert_eq!(verified, vec![&one]);
    }
}
