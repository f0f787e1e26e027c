//! The Node: one identity over a local store and a content store.
//!
//! The node owns the identity context and hands it explicitly to the
//! publisher and follow-sync engine. Every write goes to the local store
//! first; nothing reaches peers until [`Node::publish`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use filux_core::identity::validate_display_name;
use filux_core::{
    check_collision, now_millis, verify_document, verify_document_from, Collision, Document, DocumentBuilder,
    DocumentId, DocumentKind, Ed25519PublicKey, FollowEntry, Identity, Keypair, Link, Manifest,
    PointerName, Profile, ThreadManifest, ValidationError,
};
use filux_store::{ContentStore, LocalStore, StoredIdentity};
use filux_sync::{
    verify_peer_convergence, ConvergenceResult, FollowSyncConfig, FollowSyncEngine, PublishConfig,
    PublishOptions, PublishReport, Publisher, SyncFollowedOptions, SyncFollowedReport,
};

use crate::error::{NodeError, Result};
use crate::view::{sort_newest_first, FeedItem, NameBook, Resolved, ThreadView};

/// Configuration for the Node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub publish: PublishConfig,
    pub follow: FollowSyncConfig,
    /// Re-verify stored documents every time they are read.
    pub reverify_on_read: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            publish: PublishConfig::default(),
            follow: FollowSyncConfig::default(),
            reverify_on_read: true,
        }
    }
}

/// The main Node struct.
///
/// Provides a unified API for:
/// - Creating and removing documents
/// - Publishing local changes
/// - Following identities and syncing their content
/// - Reading the feed and threads
pub struct Node<L, C> {
    identity: Identity,
    local: Arc<L>,
    content: Arc<C>,
    config: NodeConfig,
}

impl<L, C> Node<L, C>
where
    L: LocalStore + 'static,
    C: ContentStore + 'static,
{
    /// Create a fresh identity in an empty local store.
    pub async fn init(
        local: Arc<L>,
        content: Arc<C>,
        display_name: &str,
        config: NodeConfig,
    ) -> Result<Self> {
        Self::init_with_keypair(local, content, Keypair::generate(), display_name, config).await
    }

    /// Like [`Node::init`] with a caller-supplied keypair.
    pub async fn init_with_keypair(
        local: Arc<L>,
        content: Arc<C>,
        keypair: Keypair,
        display_name: &str,
        config: NodeConfig,
    ) -> Result<Self> {
        if local.load_identity().await?.is_some() {
            return Err(NodeError::AlreadyInitialized);
        }

        let identity = Identity::new(keypair, display_name)?;
        let now = now_millis();
        local
            .save_identity(&StoredIdentity {
                seed: identity.keypair().seed(),
                display_name: identity.display_name().to_string(),
                created_at: now,
            })
            .await?;
        local
            .put_profile(&Profile::signed(&identity, "", now))
            .await?;

        tracing::info!(pubkey = %identity.pubkey(), name = identity.display_name(), "identity initialized");
        Ok(Self {
            identity,
            local,
            content,
            config,
        })
    }

    /// Reopen the identity persisted in `local`.
    pub async fn open(local: Arc<L>, content: Arc<C>, config: NodeConfig) -> Result<Self> {
        let stored = local
            .load_identity()
            .await?
            .ok_or(NodeError::NotInitialized)?;
        let identity = Identity::new(Keypair::from_seed(&stored.seed), &stored.display_name)?;

        Ok(Self {
            identity,
            local,
            content,
            config,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn pubkey(&self) -> Ed25519PublicKey {
        self.identity.pubkey()
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a post.
    pub async fn post(&self, content: &str) -> Result<Document> {
        self.create(|b| b.content(content)).await
    }

    /// Create a post with an explicit content type.
    pub async fn post_typed(&self, content: &str, content_type: &str) -> Result<Document> {
        self.create(|b| b.content(content).content_type(content_type))
            .await
    }

    /// Reply to a known document.
    ///
    /// The reply joins the parent's thread (or starts one at the parent)
    /// and carries the parent's participants plus the parent's author.
    pub async fn reply(&self, parent: &DocumentId, content: &str) -> Result<Document> {
        let parent = self
            .find_document(parent)
            .await?
            .ok_or_else(|| NodeError::NotFound(format!("document {}", parent)))?;

        let thread_id = parent.thread().unwrap_or(parent.id);
        let mut participants = parent.participants.clone();
        participants.insert(parent.pubkey);

        let doc = self
            .create(|b| {
                b.content(content)
                    .reply_to(parent.id)
                    .thread(thread_id)
                    .participants(participants.iter().copied())
            })
            .await?;

        self.join_thread(thread_id, &[&parent, &doc]).await?;
        Ok(doc)
    }

    /// React to a document with a token such as `"+1"`.
    pub async fn react(&self, target: &DocumentId, token: &str) -> Result<Document> {
        self.create(|b| b.kind(DocumentKind::Reaction).reply_to(*target).content(token))
            .await
    }

    /// Repost a document, optionally with a comment.
    ///
    /// The target must be known and valid unless `force` is set.
    pub async fn repost(
        &self,
        target: &DocumentId,
        comment: Option<&str>,
        force: bool,
    ) -> Result<Document> {
        if !force {
            let original = self
                .find_document(target)
                .await?
                .ok_or_else(|| NodeError::NotFound(format!("document {}", target)))?;
            verify_document(&original)?;
        }

        let comment = comment.unwrap_or_default();
        self.create(|b| b.kind(DocumentKind::Repost).reply_to(*target).content(comment))
            .await
    }

    /// Start a thread. The title is the first line of the root post.
    pub async fn start_thread(&self, title: &str, description: &str) -> Result<Document> {
        let content = if description.is_empty() {
            title.to_string()
        } else {
            format!("{}\n{}", title, description)
        };
        let root = self
            .create(|b| b.kind(DocumentKind::ThreadRoot).content(content.as_str()))
            .await?;

        self.join_thread(root.id, &[&root]).await?;
        Ok(root)
    }

    /// Delete a local document. The next publish drops its entry.
    pub async fn remove(&self, id: &DocumentId) -> Result<bool> {
        let removed = self.local.remove_document(id).await?;
        if removed {
            tracing::debug!(id = %id, "document removed");
        }
        Ok(removed)
    }

    /// Own documents that pass verification, oldest first.
    pub async fn local_documents(&self) -> Result<Vec<Document>> {
        let documents = self.local.list_documents().await?;
        if !self.config.reverify_on_read {
            return Ok(documents);
        }

        let owner = self.identity.pubkey();
        Ok(documents
            .into_iter()
            .filter(|doc| match verify_document_from(doc, &owner) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "skipping local document that fails verification");
                    false
                }
            })
            .collect())
    }

    /// Sign with the current time, stepping the timestamp until the
    /// derived id is unused, then store.
    async fn create<F>(&self, build: F) -> Result<Document>
    where
        F: Fn(DocumentBuilder) -> DocumentBuilder,
    {
        let mut timestamp = now_millis();
        loop {
            let builder =
                DocumentBuilder::new(self.identity.pubkey(), self.identity.display_name())
                    .timestamp(timestamp);
            let doc = build(builder).sign(self.identity.keypair());

            if self.local.get_document(&doc.id).await?.is_none() {
                verify_document(&doc)?;
                self.local.insert_document(&doc).await?;
                tracing::debug!(id = %doc.id, kind = doc.kind.as_str(), "document created");
                return Ok(doc);
            }
            timestamp += 1;
        }
    }

    /// An own document, or a verified cached one.
    async fn find_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        if let Some(doc) = self.local.get_document(id).await? {
            return Ok(Some(doc));
        }
        for cache in self.local.list_caches().await? {
            if let Some(cached) = cache.documents.get(id) {
                if cached.verified {
                    return Ok(Some(cached.document.clone()));
                }
            }
        }
        Ok(None)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profile Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn profile(&self) -> Result<Option<Profile>> {
        Ok(self.local.get_profile().await?)
    }

    /// Re-sign the profile with a new bio.
    pub async fn set_profile(&self, bio: &str) -> Result<Profile> {
        let profile = Profile::signed(&self.identity, bio, now_millis());
        self.local.put_profile(&profile).await?;
        Ok(profile)
    }

    /// Change the display name. The key, and so the identity, stays.
    pub async fn rename(&mut self, display_name: &str) -> Result<Profile> {
        let identity = self.identity.renamed(display_name)?;
        let stored = self
            .local
            .load_identity()
            .await?
            .ok_or(NodeError::NotInitialized)?;
        self.local
            .save_identity(&StoredIdentity {
                display_name: identity.display_name().to_string(),
                ..stored
            })
            .await?;
        self.identity = identity;

        let bio = self
            .local
            .get_profile()
            .await?
            .map(|p| p.bio)
            .unwrap_or_default();
        self.set_profile(&bio).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publish & Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Push local changes and update this identity's pointer.
    pub async fn publish(&self, options: &PublishOptions) -> Result<PublishReport> {
        let publisher = Publisher::new(
            Arc::clone(&self.local),
            Arc::clone(&self.content),
            self.config.publish.clone(),
        );
        Ok(publisher
            .publish_local_changes(&self.identity, options)
            .await?)
    }

    /// Pull every followed identity into its local cache.
    pub async fn sync_followed(&self, options: &SyncFollowedOptions) -> Result<SyncFollowedReport> {
        let follows = self.local.list_follows().await?;
        let engine = FollowSyncEngine::new(
            Arc::clone(&self.local),
            Arc::clone(&self.content),
            self.config.follow.clone(),
        );
        Ok(engine
            .sync_followed(&self.identity, &follows, options)
            .await?)
    }

    /// Whether our cache of `pubkey` matches the manifest it currently
    /// publishes.
    pub async fn verify_cache_convergence(
        &self,
        pubkey: &Ed25519PublicKey,
    ) -> Result<ConvergenceResult> {
        let manifest = self
            .fetch_manifest(&PointerName::for_identity(pubkey))
            .await?;
        Ok(verify_peer_convergence(self.local.as_ref(), &manifest).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Follow Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Follow `pubkey` under `display_name`.
    ///
    /// Following again only renames the entry. Returns the collision the
    /// name causes among self and existing follows, if any.
    pub async fn follow(
        &self,
        display_name: &str,
        pubkey: Ed25519PublicKey,
    ) -> Result<Option<Collision>> {
        if pubkey == self.identity.pubkey() {
            return Err(NodeError::FollowSelf);
        }
        let name = validate_display_name(display_name)?;

        let entry = match self.local.get_follow(&pubkey).await? {
            Some(mut existing) => {
                existing.display_name = name.clone();
                existing
            }
            None => FollowEntry::new(name.clone(), pubkey, now_millis()),
        };
        self.local.put_follow(&entry).await?;

        let known = self.known_names().await?;
        let collision = check_collision(
            &name,
            &pubkey,
            known
                .iter()
                .filter(|(k, _)| **k != pubkey)
                .map(|(k, n)| (n.as_str(), k)),
        );
        if let Some(collision) = &collision {
            tracing::warn!(
                name = %collision.display_name,
                keys = collision.pubkeys.len(),
                "followed display name is already in use"
            );
        }
        Ok(collision)
    }

    /// Stop following `pubkey` and drop its cache.
    pub async fn unfollow(&self, pubkey: &Ed25519PublicKey) -> Result<bool> {
        let removed = self.local.remove_follow(pubkey).await?;
        self.local.remove_cache(pubkey).await?;
        Ok(removed)
    }

    pub async fn follows(&self) -> Result<Vec<FollowEntry>> {
        Ok(self.local.list_follows().await?)
    }

    /// Drop the cache of one identity, or of all, and forget sync progress
    /// so the next sync refetches. Returns the caches dropped.
    pub async fn clear_cache(&self, owner: Option<&Ed25519PublicKey>) -> Result<usize> {
        let owners: BTreeSet<Ed25519PublicKey> = match owner {
            Some(pubkey) => BTreeSet::from([*pubkey]),
            None => {
                let mut owners: BTreeSet<_> = self
                    .local
                    .list_caches()
                    .await?
                    .into_iter()
                    .map(|c| c.owner)
                    .collect();
                owners.extend(self.local.list_follows().await?.into_iter().map(|f| f.pubkey));
                owners
            }
        };

        let mut cleared = 0;
        for pubkey in owners {
            if self.local.remove_cache(&pubkey).await? {
                cleared += 1;
            }
            if let Some(mut follow) = self.local.get_follow(&pubkey).await? {
                follow.reset();
                self.local.put_follow(&follow).await?;
            }
        }
        tracing::debug!(cleared, "caches cleared");
        Ok(cleared)
    }

    /// Current names of self and every follow, preferring cached profiles.
    async fn known_names(&self) -> Result<BTreeMap<Ed25519PublicKey, String>> {
        let caches: BTreeMap<_, _> = self
            .local
            .list_caches()
            .await?
            .into_iter()
            .map(|c| (c.owner, c))
            .collect();

        let mut names = BTreeMap::new();
        names.insert(
            self.identity.pubkey(),
            self.identity.display_name().to_string(),
        );
        for follow in self.local.list_follows().await? {
            let name = caches
                .get(&follow.pubkey)
                .and_then(|c| c.display_name())
                .unwrap_or(follow.display_name.as_str())
                .to_string();
            names.insert(follow.pubkey, name);
        }
        Ok(names)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Own and followed documents, newest first.
    ///
    /// Cached documents that failed verification appear only with
    /// `include_unverified`.
    pub async fn feed(&self, limit: usize, include_unverified: bool) -> Result<Vec<FeedItem>> {
        let names = NameBook::new(self.known_names().await?);
        let mut items: Vec<FeedItem> = self
            .local_documents()
            .await?
            .into_iter()
            .map(|document| FeedItem {
                display_name: names.render(&document),
                document,
                verified: true,
                own: true,
            })
            .collect();

        for (document, verified) in self.cached_documents(include_unverified).await? {
            items.push(FeedItem {
                display_name: names.render(&document),
                document,
                verified,
                own: false,
            });
        }

        sort_newest_first(&mut items);
        items.truncate(limit);
        Ok(items)
    }

    /// A thread's manifest and every known post in it.
    ///
    /// Without a stored manifest one is reconciled from the posts. Returns
    /// `None` when nothing of the thread is known.
    pub async fn thread(&self, thread_id: &DocumentId) -> Result<Option<ThreadView>> {
        let mut documents: BTreeMap<DocumentId, Document> = BTreeMap::new();
        for doc in self.local_documents().await? {
            if doc.thread() == Some(*thread_id) {
                documents.insert(doc.id, doc);
            }
        }
        for (doc, _) in self.cached_documents(false).await? {
            if doc.thread() == Some(*thread_id) {
                documents.entry(doc.id).or_insert(doc);
            }
        }

        let manifest = match self.local.get_thread(thread_id).await? {
            Some(manifest) => manifest,
            None if documents.is_empty() => return Ok(None),
            None => {
                let mut manifest = ThreadManifest::new(*thread_id);
                for doc in documents.values() {
                    manifest.apply(doc);
                }
                manifest
            }
        };

        let mut documents: Vec<Document> = documents.into_values().collect();
        documents.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(Some(ThreadView {
            manifest,
            documents,
        }))
    }

    pub async fn follow_thread(&self, thread_id: &DocumentId) -> Result<()> {
        Ok(self.local.follow_thread(thread_id, now_millis()).await?)
    }

    pub async fn unfollow_thread(&self, thread_id: &DocumentId) -> Result<bool> {
        Ok(self.local.unfollow_thread(thread_id).await?)
    }

    pub async fn followed_threads(&self) -> Result<Vec<DocumentId>> {
        Ok(self.local.list_followed_threads().await?)
    }

    /// Documents from peer caches with their verification flag.
    async fn cached_documents(&self, include_unverified: bool) -> Result<Vec<(Document, bool)>> {
        let mut documents = Vec::new();
        for cache in self.local.list_caches().await? {
            for cached in cache.documents.into_values() {
                if !cached.verified && !include_unverified {
                    continue;
                }
                if cached.verified && self.config.reverify_on_read {
                    if let Err(e) = verify_document_from(&cached.document, &cache.owner) {
                        tracing::warn!(
                            peer = %cache.owner,
                            id = %cached.document.id,
                            error = %e,
                            "skipping cached document that fails verification"
                        );
                        continue;
                    }
                }
                documents.push((cached.document, cached.verified));
            }
        }
        Ok(documents)
    }

    /// Fold documents into a thread held locally and follow it.
    async fn join_thread(&self, thread_id: DocumentId, docs: &[&Document]) -> Result<()> {
        let mut thread = self
            .local
            .get_thread(&thread_id)
            .await?
            .unwrap_or_else(|| ThreadManifest::new(thread_id));

        let mut changed = false;
        for doc in docs {
            changed |= thread.apply(doc);
        }
        if changed {
            self.local.put_thread(&thread).await?;
        }
        self.local.follow_thread(&thread_id, now_millis()).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Link Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Link to a document at its published address.
    pub async fn link_for(&self, id: &DocumentId) -> Result<Option<Link>> {
        Ok(self
            .local
            .get_manifest()
            .await?
            .and_then(|m| m.address_of(id).cloned())
            .map(Link::Content))
    }

    /// Link that always resolves to this identity's latest manifest.
    pub fn pointer_link(&self) -> Link {
        Link::Pointer(self.identity.pointer())
    }

    /// Fetch and verify a link's target.
    pub async fn resolve_link(&self, link: &Link) -> Result<Resolved> {
        match link {
            Link::Content(address) => {
                let bytes = self
                    .content
                    .get(address)
                    .await?
                    .ok_or_else(|| NodeError::NotFound(format!("content {}", address)))?;
                let doc = Document::from_json(&bytes)?;
                verify_document(&doc)?;
                Ok(Resolved::Document(doc))
            }
            Link::Pointer(pointer) => Ok(Resolved::Manifest(self.fetch_manifest(pointer).await?)),
        }
    }

    /// Resolve `pointer` and return the verified manifest it names.
    async fn fetch_manifest(&self, pointer: &PointerName) -> Result<Manifest> {
        let address = self
            .content
            .resolve(pointer)
            .await?
            .ok_or_else(|| NodeError::NotFound(format!("pointer {}", pointer)))?;
        let bytes = self
            .content
            .get(&address)
            .await?
            .ok_or_else(|| NodeError::NotFound(format!("manifest {}", address)))?;

        let manifest = Manifest::from_json(&bytes)?;
        if PointerName::for_identity(&manifest.owner_pubkey) != *pointer {
            return Err(ValidationError::AuthorMismatch {
                expected: pointer.to_string(),
                got: manifest.owner_pubkey.to_hex(),
            }
            .into());
        }
        manifest.verify()?;
        Ok(manifest)
    }
}
