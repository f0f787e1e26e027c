//! Pulling followed identities into the local read cache.
//!
//! For each [`FollowEntry`], [`FollowSyncEngine::sync_followed`] resolves
//! the peer's pointer (or takes a direct address), fetches and checks the
//! manifest, and fetches only the entries the cache lacks. Every fetched
//! record is verified before it is cached. Peers run concurrently, bounded
//! by `max_workers`; results are keyed by pubkey.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use filux_core::collision::detect_all;
use filux_core::{
    now_millis, profile_id, thread_manifest_id, verify_document_from, ContentAddress, Document,
    Ed25519PublicKey, EntryKind, FollowEntry, Identity, LocalCache, Manifest, ManifestEntry,
    Profile, ThreadManifest, ValidationError,
};
use filux_store::{ContentStore, LocalStore};

use crate::error::{ItemError, Result};
use crate::report::{EntryFailure, PeerOutcome, PeerStatus, SyncFollowedReport};

/// Configuration for follow-sync.
#[derive(Debug, Clone)]
pub struct FollowSyncConfig {
    /// Peers synced concurrently.
    pub max_workers: usize,
    /// Most new entries fetched per peer per sync, newest first.
    pub per_peer_limit: Option<usize>,
}

impl Default for FollowSyncConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            per_peer_limit: None,
        }
    }
}

/// Per-call follow-sync options.
#[derive(Debug, Clone, Default)]
pub struct SyncFollowedOptions {
    /// Also fetch and merge the peers' thread manifests.
    pub fetch_threads: bool,
    /// Cache records that fail verification, flagged as unverified.
    pub allow_unverified: bool,
    /// Manifest addresses to use instead of resolving pointers.
    pub direct_addresses: BTreeMap<Ed25519PublicKey, ContentAddress>,
}

/// Pulls followed identities into local caches.
pub struct FollowSyncEngine<L, C> {
    local: Arc<L>,
    content: Arc<C>,
    config: FollowSyncConfig,
    /// Held across each read-modify-write of a thread manifest. Threads are
    /// shared between peers, unlike caches and follow entries.
    threads: Arc<Mutex<()>>,
}

impl<L, C> FollowSyncEngine<L, C>
where
    L: LocalStore + 'static,
    C: ContentStore + 'static,
{
    pub fn new(local: Arc<L>, content: Arc<C>, config: FollowSyncConfig) -> Self {
        Self {
            local,
            content,
            config,
            threads: Arc::new(Mutex::new(())),
        }
    }

    /// Sync every entry of `follows`.
    ///
    /// One peer's failure never aborts the batch. Collisions are computed
    /// over `identity` and every followed identity afterwards.
    pub async fn sync_followed(
        &self,
        identity: &Identity,
        follows: &[FollowEntry],
        options: &SyncFollowedOptions,
    ) -> Result<SyncFollowedReport> {
        let mut report = SyncFollowedReport::default();
        let permits = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for follow in follows {
            if follow.pubkey == identity.pubkey() {
                tracing::debug!("skipping self in follow list");
                continue;
            }
            // Pre-filled so a panicked task still leaves a slot.
            report.peers.insert(
                follow.pubkey,
                PeerOutcome::new(follow.pubkey, follow.display_name.clone())
                    .failed(ItemError::Store("peer sync did not complete".into())),
            );

            let peer = PeerSync {
                local: Arc::clone(&self.local),
                content: Arc::clone(&self.content),
                per_peer_limit: self.config.per_peer_limit,
                options: options.clone(),
                threads: Arc::clone(&self.threads),
            };
            let follow = follow.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                peer.run(follow).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.peers.insert(outcome.pubkey, outcome);
                }
                Err(e) => tracing::warn!(error = %e, "peer sync task failed"),
            }
        }

        report.collisions = self.collisions(identity).await?;
        for collision in &report.collisions {
            tracing::warn!(
                name = %collision.display_name,
                keys = collision.pubkeys.len(),
                "display name shared by distinct identities"
            );
        }

        tracing::info!(
            peers = report.peers.len(),
            updated = report.updated().count(),
            stale = report.stale().count(),
            failed = report.failed().count(),
            fetched = report.fetched_count(),
            rejected = report.rejected_count(),
            "follow sync complete"
        );
        Ok(report)
    }

    /// Collisions among self and every follow, using cached profile names
    /// where available.
    async fn collisions(&self, identity: &Identity) -> Result<Vec<filux_core::Collision>> {
        let caches: BTreeMap<Ed25519PublicKey, LocalCache> = self
            .local
            .list_caches()
            .await?
            .into_iter()
            .map(|c| (c.owner, c))
            .collect();

        let mut names: Vec<(String, Ed25519PublicKey)> =
            vec![(identity.display_name().to_string(), identity.pubkey())];
        for follow in self.local.list_follows().await? {
            let name = caches
                .get(&follow.pubkey)
                .and_then(|c| c.display_name())
                .unwrap_or(follow.display_name.as_str())
                .to_string();
            names.push((name, follow.pubkey));
        }

        Ok(detect_all(names.iter().map(|(n, k)| (n.as_str(), k))))
    }
}

/// One peer's sync, owned by its task.
struct PeerSync<L, C> {
    local: Arc<L>,
    content: Arc<C>,
    per_peer_limit: Option<usize>,
    options: SyncFollowedOptions,
    threads: Arc<Mutex<()>>,
}

impl<L: LocalStore, C: ContentStore> PeerSync<L, C> {
    async fn run(self, follow: FollowEntry) -> PeerOutcome {
        let outcome = PeerOutcome::new(follow.pubkey, follow.display_name.clone());
        match self.sync(follow, outcome.clone()).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(peer = %outcome.pubkey, error = %error, "peer sync failed");
                outcome.failed(error)
            }
        }
    }

    async fn sync(
        &self,
        mut follow: FollowEntry,
        mut outcome: PeerOutcome,
    ) -> std::result::Result<PeerOutcome, ItemError> {
        let peer = follow.pubkey;

        let address = match self.options.direct_addresses.get(&peer) {
            Some(address) => address.clone(),
            None => self
                .content
                .resolve(&follow.pointer())
                .await?
                .ok_or_else(|| ItemError::NotFound(format!("pointer {}", follow.pointer())))?,
        };
        outcome.manifest_address = Some(address.clone());

        let manifest = self.fetch_manifest(&peer, &address).await?;
        outcome.manifest_version = Some(manifest.manifest_version);

        // Persist progress on the current record so concurrent follow edits
        // are not clobbered with the caller's snapshot.
        if let Some(current) = self.local.get_follow(&peer).await.map_err(ItemError::from)? {
            follow = current;
        }
        follow.last_known_pointer = Some(address);

        let cache = self.local.get_cache(&peer).await?;
        // Thread entries skipped by earlier syncs without `fetch_threads`
        // are still owed even when the version has not moved.
        let threads_owed = self.options.fetch_threads
            && cache.as_ref().is_some_and(|c| {
                c.missing_entries(&manifest)
                    .iter()
                    .any(|e| e.kind == EntryKind::ThreadManifest)
            });
        if cache.is_some() && !follow.is_newer(&manifest.manifest_version) && !threads_owed {
            tracing::debug!(peer = %peer, version = %manifest.manifest_version, "manifest not newer");
            self.local.put_follow(&follow).await?;
            outcome.status = PeerStatus::Stale;
            return Ok(outcome);
        }
        let mut cache = cache.unwrap_or_else(|| LocalCache::new(peer));

        let mut missing: Vec<ManifestEntry> = cache
            .missing_entries(&manifest)
            .into_iter()
            .filter(|e| self.options.fetch_threads || e.kind != EntryKind::ThreadManifest)
            .collect();
        if let Some(limit) = self.per_peer_limit {
            if missing.len() > limit {
                // Newest first; the rest waits for the next sync.
                missing.sort_by(|a, b| b.added_at.cmp(&a.added_at));
                outcome.deferred = missing.len() - limit;
                missing.truncate(limit);
            }
        }

        let mut transient = false;
        for entry in missing {
            match self.fetch_entry(&peer, &entry, &mut cache, &mut outcome).await {
                Ok(()) => {}
                Err(error) if error.is_transient() => {
                    tracing::debug!(peer = %peer, id = %entry.id, error = %error, "entry unreachable");
                    transient = true;
                    outcome.unreachable.push(EntryFailure {
                        id: entry.id,
                        address: entry.address.clone(),
                        error,
                    });
                }
                Err(error) => {
                    tracing::warn!(peer = %peer, id = %entry.id, error = %error, "discarding entry");
                    outcome.rejected.push(EntryFailure {
                        id: entry.id,
                        address: entry.address.clone(),
                        error,
                    });
                }
            }
        }

        outcome.pruned = cache.prune_to(&manifest);
        cache.refreshed_at = now_millis();

        if !transient && outcome.deferred == 0 {
            cache.manifest_version = Some(manifest.manifest_version);
            follow.last_known_manifest_version = Some(manifest.manifest_version);
        }

        self.local.put_cache(&cache).await?;
        self.local.put_follow(&follow).await?;

        tracing::debug!(
            peer = %peer,
            version = %manifest.manifest_version,
            fetched = outcome.fetched.len(),
            rejected = outcome.rejected.len(),
            "peer updated"
        );
        outcome.status = PeerStatus::Updated;
        Ok(outcome)
    }

    async fn fetch_manifest(
        &self,
        peer: &Ed25519PublicKey,
        address: &ContentAddress,
    ) -> std::result::Result<Manifest, ItemError> {
        let bytes = self
            .content
            .get(address)
            .await?
            .ok_or_else(|| ItemError::NotFound(format!("manifest {}", address)))?;
        let manifest =
            Manifest::from_json(&bytes).map_err(|e| ItemError::Malformed(e.to_string()))?;

        if &manifest.owner_pubkey != peer {
            return Err(ValidationError::AuthorMismatch {
                expected: peer.to_hex(),
                got: manifest.owner_pubkey.to_hex(),
            }
            .into());
        }
        if let Err(e) = manifest.verify() {
            if !self.options.allow_unverified {
                return Err(e.into());
            }
            tracing::warn!(peer = %peer, error = %e, "using unverified manifest");
        }
        Ok(manifest)
    }

    async fn fetch_entry(
        &self,
        peer: &Ed25519PublicKey,
        entry: &ManifestEntry,
        cache: &mut LocalCache,
        outcome: &mut PeerOutcome,
    ) -> std::result::Result<(), ItemError> {
        let Some(address) = entry.address.as_ref() else {
            return Ok(());
        };
        let bytes = self
            .content
            .get(address)
            .await?
            .ok_or_else(|| ItemError::NotFound(format!("entry {} at {}", entry.id, address)))?;

        match entry.kind {
            EntryKind::Profile => {
                let profile =
                    Profile::from_json(&bytes).map_err(|e| ItemError::Malformed(e.to_string()))?;
                check_profile(peer, entry, &profile)?;
                cache.profile = Some(profile);
                cache.hold(entry.clone());
                outcome.fetched.push(entry.id);
            }
            EntryKind::ThreadManifest => {
                let thread = ThreadManifest::from_json(&bytes)
                    .map_err(|e| ItemError::Malformed(e.to_string()))?;
                if thread_manifest_id(&thread.thread_id) != entry.id {
                    return Err(ItemError::Malformed(format!(
                        "thread manifest {} listed under {}",
                        thread.thread_id, entry.id
                    )));
                }
                let _guard = self.threads.lock().await;
                let merged = match self.local.get_thread(&thread.thread_id).await? {
                    Some(held) => held.merge(&thread).unwrap_or(held),
                    None => thread,
                };
                self.local.put_thread(&merged).await?;
                cache.hold(entry.clone());
                outcome.threads_merged.push(merged.thread_id);
                outcome.fetched.push(entry.id);
            }
            _ => {
                let doc =
                    Document::from_json(&bytes).map_err(|e| ItemError::Malformed(e.to_string()))?;
                let verified = match verify_document_from(&doc, peer)
                    .and_then(|()| check_listed(entry, &doc))
                {
                    Ok(()) => true,
                    Err(e) if self.options.allow_unverified => {
                        tracing::warn!(peer = %peer, id = %entry.id, error = %e, "caching unverified document");
                        false
                    }
                    Err(e) => return Err(e.into()),
                };

                if verified {
                    self.reconcile_thread(&doc).await?;
                    outcome.fetched.push(entry.id);
                } else {
                    outcome.unverified.push(entry.id);
                }
                cache.insert_document(entry.clone(), doc, verified, now_millis());
            }
        }
        Ok(())
    }

    /// Fold a verified document into the local copy of its thread, if the
    /// thread is held or followed.
    async fn reconcile_thread(&self, doc: &Document) -> std::result::Result<(), ItemError> {
        let Some(thread_id) = doc.thread() else {
            return Ok(());
        };
        let _guard = self.threads.lock().await;
        let mut thread = match self.local.get_thread(&thread_id).await? {
            Some(thread) => thread,
            None => {
                if !self.local.list_followed_threads().await?.contains(&thread_id) {
                    return Ok(());
                }
                ThreadManifest::new(thread_id)
            }
        };
        if thread.apply(doc) {
            self.local.put_thread(&thread).await?;
        }
        Ok(())
    }
}

fn check_profile(
    peer: &Ed25519PublicKey,
    entry: &ManifestEntry,
    profile: &Profile,
) -> std::result::Result<(), ItemError> {
    if &profile.pubkey != peer {
        return Err(ValidationError::AuthorMismatch {
            expected: peer.to_hex(),
            got: profile.pubkey.to_hex(),
        }
        .into());
    }
    if entry.id != profile_id(peer) {
        return Err(ItemError::Malformed(format!(
            "profile listed under {}",
            entry.id
        )));
    }
    Ok(profile.verify()?)
}

/// The document must be the one its entry names, and of the listed kind.
fn check_listed(entry: &ManifestEntry, doc: &Document) -> std::result::Result<(), ValidationError> {
    if entry.id != doc.id {
        return Err(ValidationError::IdMismatch {
            claimed: entry.id,
            derived: doc.id,
        });
    }
    if EntryKind::from(doc.kind) != entry.kind {
        return Err(ValidationError::StructuralError(format!(
            "listed as {}, is {}",
            entry.kind.as_str(),
            doc.kind.as_str()
        )));
    }
    Ok(())
}
