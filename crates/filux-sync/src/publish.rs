//! Publishing local state to the content store.
//!
//! One call of [`Publisher::publish_local_changes`]:
//!
//! 1. Collects the profile, every local document and every thread manifest
//!    the identity participates in. Each is re-verified and serialized.
//! 2. Pushes those whose content hash differs from the last publish, and
//!    those last pushed to a local-only store if a reachable one is now in
//!    use. A push failure is recorded for that item only.
//! 3. Drops manifest entries whose local record is gone.
//! 4. If nothing was pushed or dropped, stops without touching the content
//!    store (no-op rule).
//! 5. Otherwise bumps and signs the manifest, pushes it, points the
//!    identity's pointer at it and commits the new publish state locally.
//! 6. Optionally waits for the pointer to resolve to the new manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use filux_core::{
    now_millis, thread_manifest_id, verify_document_from, Blake3Hash, ContentAddress, DocumentId, EntryChange,
    EntryKind, Identity, Manifest,
};
use filux_store::{ContentStore, LocalStore, PublishRecord};

use crate::error::{ItemError, Result, SyncError};
use crate::propagation::wait_for_pointer;
use crate::report::{FailedItem, Propagation, PublishReport, PublishStatus, PublishedItem};

/// Configuration for publishing.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// How often to resolve the pointer while waiting for propagation.
    pub propagation_poll_interval: Duration,
    /// Wait used when a caller asks to wait without naming a timeout.
    pub propagation_timeout: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            propagation_poll_interval: Duration::from_millis(250),
            propagation_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-call publish options.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Block until the pointer resolves to the new manifest, at most this
    /// long.
    pub wait_for_propagation: Option<Duration>,
}

impl PublishOptions {
    /// Wait up to `timeout` for propagation.
    pub fn wait(timeout: Duration) -> Self {
        Self {
            wait_for_propagation: Some(timeout),
        }
    }
}

/// A serialized record ready to be pushed.
struct Candidate {
    id: DocumentId,
    kind: EntryKind,
    bytes: Bytes,
    hash: Blake3Hash,
    added_at: i64,
}

impl Candidate {
    fn new(id: DocumentId, kind: EntryKind, bytes: Vec<u8>, added_at: i64) -> Self {
        let hash = Blake3Hash::hash(&bytes);
        Self {
            id,
            kind,
            bytes: Bytes::from(bytes),
            hash,
            added_at,
        }
    }
}

/// Publishes one identity's local state.
pub struct Publisher<L, C> {
    local: Arc<L>,
    content: Arc<C>,
    config: PublishConfig,
}

impl<L: LocalStore, C: ContentStore> Publisher<L, C> {
    pub fn new(local: Arc<L>, content: Arc<C>, config: PublishConfig) -> Self {
        Self {
            local,
            content,
            config,
        }
    }

    /// Push new and changed records and republish the manifest if needed.
    ///
    /// Per-item failures land in the report. Errors are returned only for
    /// local persistence failures and for a failed manifest or pointer push.
    pub async fn publish_local_changes(
        &self,
        identity: &Identity,
        options: &PublishOptions,
    ) -> Result<PublishReport> {
        let owner = identity.pubkey();
        let mut manifest = match self.local.get_manifest().await? {
            Some(m) if m.owner_pubkey != owner => {
                return Err(SyncError::OwnerMismatch {
                    expected: owner.to_hex(),
                    found: m.owner_pubkey.to_hex(),
                });
            }
            Some(m) => m,
            None => Manifest::new(owner),
        };

        let records: BTreeMap<DocumentId, PublishRecord> = self
            .local
            .list_publish_records()
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let mut report = PublishReport::default();
        let mut new_records = Vec::new();
        let mut keep: BTreeSet<DocumentId> = BTreeSet::new();
        let mut writes = 0usize;

        // Pass 1: profile and documents.
        let candidates = self.collect_own(identity, &mut keep, &mut report).await?;
        for candidate in candidates {
            writes += self
                .push(candidate, &records, &mut manifest, &mut new_records, &mut report)
                .await;
        }

        // Pass 2: threads, now that root addresses are known.
        let candidates = self.collect_threads(identity, &manifest, &mut keep).await?;
        for candidate in candidates {
            writes += self
                .push(candidate, &records, &mut manifest, &mut new_records, &mut report)
                .await;
        }

        let stale: Vec<DocumentId> = manifest
            .entries
            .iter()
            .map(|e| e.id)
            .filter(|id| !keep.contains(id))
            .collect();
        for id in &stale {
            manifest.remove(id);
            tracing::debug!(id = %id, "dropping manifest entry");
        }
        report.removed = stale;

        report.local_only = self.content.is_local_only();
        report.manifest_version = manifest.manifest_version;

        if report.published.is_empty() && report.removed.is_empty() {
            report.content_writes = writes;
            tracing::debug!(
                version = %manifest.manifest_version,
                unchanged = report.unchanged,
                "nothing to publish"
            );
            return Ok(report);
        }

        if !manifest.bump_version() {
            tracing::warn!(version = %manifest.manifest_version, "manifest version saturated");
        }
        manifest.sign(identity.keypair())?;

        let address = self.content.add(Bytes::from(manifest.to_json()?)).await?;
        self.content.publish(&identity.pointer(), &address).await?;
        writes += 2;

        self.local
            .commit_publish(&manifest, &new_records, &report.removed)
            .await?;

        report.republished = true;
        report.manifest_version = manifest.manifest_version;
        report.manifest_address = Some(address.clone());
        report.content_writes = writes;

        if let Some(timeout) = options.wait_for_propagation {
            let confirmed = wait_for_pointer(
                self.content.as_ref(),
                &identity.pointer(),
                &address,
                timeout,
                self.config.propagation_poll_interval,
            )
            .await;
            report.propagation = if confirmed {
                Propagation::Confirmed
            } else {
                tracing::warn!(
                    pointer = %identity.pointer(),
                    manifest = %address,
                    "pointer update not observed before timeout"
                );
                Propagation::Unconfirmed
            };
        }

        if report.local_only {
            tracing::warn!(manifest = %address, "published to local-only address space");
        }
        tracing::info!(
            version = %manifest.manifest_version,
            new = report.new_count(),
            changed = report.changed_count(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "published manifest"
        );

        Ok(report)
    }

    /// Profile and documents, re-verified. Failures go to the report but
    /// keep their manifest entries.
    async fn collect_own(
        &self,
        identity: &Identity,
        keep: &mut BTreeSet<DocumentId>,
        report: &mut PublishReport,
    ) -> Result<Vec<Candidate>> {
        let owner = identity.pubkey();
        let mut candidates = Vec::new();

        if let Some(profile) = self.local.get_profile().await? {
            keep.insert(profile.id());
            let checked = profile.verify().and_then(|()| {
                if profile.pubkey == owner {
                    Ok(())
                } else {
                    Err(filux_core::ValidationError::AuthorMismatch {
                        expected: owner.to_hex(),
                        got: profile.pubkey.to_hex(),
                    })
                }
            });
            match checked {
                Ok(()) => candidates.push(Candidate::new(
                    profile.id(),
                    EntryKind::Profile,
                    profile.to_json()?,
                    profile.updated_at,
                )),
                Err(e) => {
                    tracing::warn!(error = %e, "local profile failed verification");
                    report.failed.push(FailedItem {
                        id: profile.id(),
                        kind: EntryKind::Profile,
                        error: e.into(),
                    });
                }
            }
        }

        for doc in self.local.list_documents().await? {
            keep.insert(doc.id);
            match verify_document_from(&doc, &owner) {
                Ok(()) => candidates.push(Candidate::new(
                    doc.id,
                    doc.kind.into(),
                    doc.to_json()?,
                    doc.timestamp,
                )),
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "local document failed verification");
                    report.failed.push(FailedItem {
                        id: doc.id,
                        kind: doc.kind.into(),
                        error: e.into(),
                    });
                }
            }
        }

        Ok(candidates)
    }

    /// Thread manifests the identity participates in, with root addresses
    /// filled from `manifest`.
    async fn collect_threads(
        &self,
        identity: &Identity,
        manifest: &Manifest,
        keep: &mut BTreeSet<DocumentId>,
    ) -> Result<Vec<Candidate>> {
        let owner = identity.pubkey();
        let mut candidates = Vec::new();

        for mut thread in self.local.list_threads().await? {
            if !thread.participants.contains(&owner) {
                continue;
            }
            if let Some(address) = manifest.address_of(&thread.thread_id) {
                if thread.set_root_address(address.clone()) {
                    self.local.put_thread(&thread).await?;
                }
            }

            let id = thread_manifest_id(&thread.thread_id);
            keep.insert(id);
            let added_at = manifest
                .entry(&id)
                .map(|e| e.added_at)
                .unwrap_or_else(now_millis);
            candidates.push(Candidate::new(
                id,
                EntryKind::ThreadManifest,
                thread.to_json()?,
                added_at,
            ));
        }

        Ok(candidates)
    }

    /// Push one candidate if its hash changed. Returns the writes made.
    async fn push(
        &self,
        candidate: Candidate,
        records: &BTreeMap<DocumentId, PublishRecord>,
        manifest: &mut Manifest,
        new_records: &mut Vec<PublishRecord>,
        report: &mut PublishReport,
    ) -> usize {
        let reachable = !self.content.is_local_only();
        let previous = records.get(&candidate.id);
        let unchanged = previous.is_some_and(|r| {
            r.content_hash == candidate.hash
                && manifest.address_of(&candidate.id) == Some(&r.address)
                && !(r.local_only && reachable)
        });
        if unchanged {
            report.unchanged += 1;
            return 0;
        }

        let address: ContentAddress = match self.content.add(candidate.bytes).await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(id = %candidate.id, error = %e, "failed to push entry");
                report.failed.push(FailedItem {
                    id: candidate.id,
                    kind: candidate.kind,
                    error: ItemError::from(e),
                });
                return 0;
            }
        };

        let status = match manifest.record(candidate.id, address.clone(), candidate.kind, candidate.added_at) {
            EntryChange::Added => PublishStatus::New,
            EntryChange::AddressChanged | EntryChange::Unchanged => PublishStatus::Changed,
        };
        tracing::debug!(id = %candidate.id, kind = candidate.kind.as_str(), address = %address, "pushed entry");

        new_records.push(PublishRecord {
            id: candidate.id,
            content_hash: candidate.hash,
            address: address.clone(),
            published_at: now_millis(),
            local_only: self.content.is_local_only(),
        });
        report.published.push(PublishedItem {
            id: candidate.id,
            kind: candidate.kind,
            address,
            status,
        });
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filux_core::{DocumentBuilder, DocumentKind, Keypair, Profile, ThreadManifest};
    use filux_store::{MemoryContentStore, MemoryStore};

    struct Setup {
        identity: Identity,
        local: Arc<MemoryStore>,
        content: Arc<MemoryContentStore>,
        publisher: Publisher<MemoryStore, MemoryContentStore>,
    }

    fn setup() -> Setup {
        let identity = Identity::new(Keypair::from_seed(&[1; 32]), "alice").unwrap();
        let local = Arc::new(MemoryStore::new());
        let content = Arc::new(MemoryContentStore::new());
        let publisher = Publisher::new(
            Arc::clone(&local),
            Arc::clone(&content),
            PublishConfig {
                propagation_poll_interval: Duration::from_millis(5),
                ..PublishConfig::default()
            },
        );
        Setup {
            identity,
            local,
            content,
            publisher,
        }
    }

    async fn post(s: &Setup, ts: i64, content: &str) -> filux_core::Document {
        let doc = DocumentBuilder::new(s.identity.pubkey(), s.identity.display_name())
            .timestamp(ts)
            .content(content)
            .sign(s.identity.keypair());
        s.local.insert_document(&doc).await.unwrap();
        doc
    }

    #[tokio::test]
    async fn test_first_publish_pushes_everything() {
        let s = setup();
        let doc = post(&s, 1, "hello").await;

        let report = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::default())
            .await
            .unwrap();

        assert!(report.republished);
        assert_eq!(report.new_count(), 1);
        assert_eq!(report.manifest_version.to_string(), "0.0.0.1");
        assert_eq!(report.content_writes, 3);

        let manifest = s.local.get_manifest().await.unwrap().unwrap();
        manifest.verify().unwrap();
        assert!(manifest.address_of(&doc.id).is_some());
        let resolved = s.content.resolve(&s.identity.pointer()).await.unwrap();
        assert_eq!(resolved, report.manifest_address);
    }

    #[tokio::test]
    async fn test_second_publish_is_noop() {
        let s = setup();
        post(&s, 1, "hello").await;
        let options = PublishOptions::default();

        s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();
        let writes = s.content.write_count();
        let calls = s.content.call_count();

        let report = s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.content_writes, 0);
        assert_eq!(s.content.write_count(), writes);
        // Not even a pointer lookup.
        assert_eq!(s.content.call_count(), calls);
        assert_eq!(report.manifest_address, None);
        assert_eq!(report.manifest_version.to_string(), "0.0.0.1");
    }

    #[tokio::test]
    async fn test_only_new_documents_are_pushed() {
        let s = setup();
        post(&s, 1, "one").await;
        let options = PublishOptions::default();
        s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();

        let two = post(&s, 2, "two").await;
        let report = s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();

        assert_eq!(report.published.len(), 1);
        assert_eq!(report.published[0].id, two.id);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.manifest_version.to_string(), "0.0.0.2");
    }

    #[tokio::test]
    async fn test_changed_profile_is_republished_in_place() {
        let s = setup();
        let options = PublishOptions::default();
        s.local
            .put_profile(&Profile::signed(&s.identity, "first", 1))
            .await
            .unwrap();
        s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();

        s.local
            .put_profile(&Profile::signed(&s.identity, "second", 2))
            .await
            .unwrap();
        let report = s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();

        assert_eq!(report.changed_count(), 1);
        assert_eq!(report.published[0].kind, EntryKind::Profile);
        let manifest = s.local.get_manifest().await.unwrap().unwrap();
        assert_eq!(manifest.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_removal_triggers_republish() {
        let s = setup();
        let doc = post(&s, 1, "oops").await;
        let options = PublishOptions::default();
        s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();

        s.local.remove_document(&doc.id).await.unwrap();
        let report = s.publisher.publish_local_changes(&s.identity, &options).await.unwrap();

        assert!(report.republished);
        assert_eq!(report.removed, vec![doc.id]);
        let manifest = s.local.get_manifest().await.unwrap().unwrap();
        assert!(manifest.entries.is_empty());
        assert!(s.local.get_publish_record(&doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_failure_is_per_item() {
        let s = setup();
        post(&s, 1, "hello").await;
        s.content.set_available(false);

        let result = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::default())
            .await;

        // The document fails as an item; with nothing pushed there is
        // nothing to republish, so the call itself succeeds.
        let report = result.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, ItemError::StoreUnavailable(_)));
        assert!(!report.republished);
    }

    #[tokio::test]
    async fn test_tampered_document_is_reported_not_published() {
        let s = setup();
        let mut doc = DocumentBuilder::new(s.identity.pubkey(), "alice")
            .timestamp(1)
            .content("original")
            .sign(s.identity.keypair());
        doc.content = "tampered".into();
        s.local.insert_document(&doc).await.unwrap();

        let report = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, ItemError::VerificationFailed(_)));
        assert!(report.published.is_empty());
    }

    #[tokio::test]
    async fn test_thread_manifest_published_with_root_address() {
        let s = setup();
        let root = DocumentBuilder::new(s.identity.pubkey(), "alice")
            .timestamp(1)
            .content("Rust\nlet's talk")
            .kind(DocumentKind::ThreadRoot)
            .sign(s.identity.keypair());
        s.local.insert_document(&root).await.unwrap();
        s.local
            .put_thread(&filux_core::thread::reconcile(root.id, &root))
            .await
            .unwrap();

        // A thread we only observe is not ours to publish.
        let mut foreign = ThreadManifest::new(DocumentId::from_bytes([7; 16]));
        foreign.participants.insert(Keypair::from_seed(&[9; 32]).public_key());
        s.local.put_thread(&foreign).await.unwrap();

        let report = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(report.published.len(), 2);
        let manifest = s.local.get_manifest().await.unwrap().unwrap();
        let thread_entry = manifest.entry(&thread_manifest_id(&root.id)).unwrap();
        assert_eq!(thread_entry.kind, EntryKind::ThreadManifest);
        assert!(manifest.entry(&thread_manifest_id(&foreign.thread_id)).is_none());

        let thread = s.local.get_thread(&root.id).await.unwrap().unwrap();
        assert_eq!(thread.root_address.as_ref(), manifest.address_of(&root.id));
    }

    #[tokio::test]
    async fn test_propagation_confirmed_and_unconfirmed() {
        let s = setup();
        post(&s, 1, "one").await;
        let report = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::wait(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(report.propagation, Propagation::Confirmed);

        s.content.hold_pointers();
        post(&s, 2, "two").await;
        let report = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::wait(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(report.republished);
        assert_eq!(report.propagation, Propagation::Unconfirmed);
    }

    #[tokio::test]
    async fn test_foreign_manifest_is_fatal() {
        let s = setup();
        let other = Keypair::from_seed(&[2; 32]);
        s.local.put_manifest(&Manifest::new(other.public_key())).await.unwrap();

        let result = s
            .publisher
            .publish_local_changes(&s.identity, &PublishOptions::default())
            .await;
        assert!(matches!(result, Err(SyncError::OwnerMismatch { .. })));
    }
}
