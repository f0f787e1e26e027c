//! Structured results of batch operations.
//!
//! Every batch returns a report enumerating successes, skips and failures
//! rather than failing all-or-nothing.

use std::collections::BTreeMap;

use filux_core::collision::Collision;
use filux_core::{ContentAddress, DocumentId, Ed25519PublicKey, EntryKind, ManifestVersion};

use crate::error::ItemError;

/// Whether a pushed entry was new to the manifest or replaced an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    New,
    Changed,
}

/// One entry pushed to the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedItem {
    pub id: DocumentId,
    pub kind: EntryKind,
    pub address: ContentAddress,
    pub status: PublishStatus,
}

/// One entry that could not be published this round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub id: DocumentId,
    pub kind: EntryKind,
    pub error: ItemError,
}

/// Outcome of waiting for the pointer to resolve to the new manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// No wait requested, or nothing was republished.
    #[default]
    NotRequested,
    /// The pointer resolved to the new manifest within the timeout.
    Confirmed,
    /// Timed out. The publish still succeeded.
    Unconfirmed,
}

/// Result of `publish_local_changes`.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Entries pushed this round.
    pub published: Vec<PublishedItem>,
    /// Entries whose content hash matched the last publish.
    pub unchanged: usize,
    /// Entries dropped because the local record is gone.
    pub removed: Vec<DocumentId>,
    /// Entries that failed to push or failed re-verification.
    pub failed: Vec<FailedItem>,
    /// Whether a new manifest was pushed and the pointer updated.
    pub republished: bool,
    /// Address of the manifest pushed by this call; `None` on a no-op.
    pub manifest_address: Option<ContentAddress>,
    /// Manifest version after this call.
    pub manifest_version: ManifestVersion,
    /// Addresses are not retrievable by peers.
    pub local_only: bool,
    pub propagation: Propagation,
    /// `add` plus `publish` calls made against the content store.
    pub content_writes: usize,
}

impl PublishReport {
    /// Nothing was pushed and nothing failed.
    pub fn is_noop(&self) -> bool {
        !self.republished && self.failed.is_empty()
    }

    pub fn new_count(&self) -> usize {
        self.published
            .iter()
            .filter(|p| p.status == PublishStatus::New)
            .count()
    }

    pub fn changed_count(&self) -> usize {
        self.published
            .iter()
            .filter(|p| p.status == PublishStatus::Changed)
            .count()
    }
}

/// How one followed identity fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStatus {
    /// Entries were diffed and merged.
    Updated,
    /// The manifest version did not advance; nothing fetched.
    Stale,
    /// The peer's manifest could not be obtained or trusted.
    Failed(ItemError),
}

/// One entry that was fetched but not merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub id: DocumentId,
    pub address: Option<ContentAddress>,
    pub error: ItemError,
}

/// Per-identity slot of a [`SyncFollowedReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerOutcome {
    pub pubkey: Ed25519PublicKey,
    pub display_name: String,
    pub status: PeerStatus,
    /// Manifest address used this round.
    pub manifest_address: Option<ContentAddress>,
    pub manifest_version: Option<ManifestVersion>,
    /// Entries fetched, verified and cached.
    pub fetched: Vec<DocumentId>,
    /// Entries cached under `allow_unverified` despite failing verification.
    pub unverified: Vec<DocumentId>,
    /// Entries discarded: failed verification or malformed.
    pub rejected: Vec<EntryFailure>,
    /// Entries that could not be fetched; retried next sync.
    pub unreachable: Vec<EntryFailure>,
    /// Entries the peer no longer lists, dropped from the cache.
    pub pruned: Vec<DocumentId>,
    /// Thread manifests merged from this peer.
    pub threads_merged: Vec<DocumentId>,
    /// Entries left for a later sync by `per_peer_limit`.
    pub deferred: usize,
}

impl PeerOutcome {
    pub fn new(pubkey: Ed25519PublicKey, display_name: impl Into<String>) -> Self {
        Self {
            pubkey,
            display_name: display_name.into(),
            status: PeerStatus::Updated,
            manifest_address: None,
            manifest_version: None,
            fetched: Vec::new(),
            unverified: Vec::new(),
            rejected: Vec::new(),
            unreachable: Vec::new(),
            pruned: Vec::new(),
            threads_merged: Vec::new(),
            deferred: 0,
        }
    }

    pub(crate) fn failed(mut self, error: ItemError) -> Self {
        self.status = PeerStatus::Failed(error);
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, PeerStatus::Failed(_))
    }
}

/// Result of `sync_followed`, keyed by pubkey so it is independent of
/// completion order.
#[derive(Debug, Clone, Default)]
pub struct SyncFollowedReport {
    pub peers: BTreeMap<Ed25519PublicKey, PeerOutcome>,
    /// Display names shared by distinct keys among self and follows.
    pub collisions: Vec<Collision>,
}

impl SyncFollowedReport {
    pub fn peer(&self, pubkey: &Ed25519PublicKey) -> Option<&PeerOutcome> {
        self.peers.get(pubkey)
    }

    pub fn updated(&self) -> impl Iterator<Item = &PeerOutcome> {
        self.peers
            .values()
            .filter(|p| p.status == PeerStatus::Updated)
    }

    pub fn stale(&self) -> impl Iterator<Item = &PeerOutcome> {
        self.peers.values().filter(|p| p.status == PeerStatus::Stale)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PeerOutcome> {
        self.peers.values().filter(|p| p.is_failed())
    }

    /// Documents fetched and cached across all peers.
    pub fn fetched_count(&self) -> usize {
        self.peers
            .values()
            .map(|p| p.fetched.len() + p.unverified.len())
            .sum()
    }

    pub fn rejected_count(&self) -> usize {
        self.peers.values().map(|p| p.rejected.len()).sum()
    }
}
