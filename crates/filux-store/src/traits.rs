//! Storage traits: the content-store capability and local persistence.
//!
//! [`ContentStore`] is the external collaborator: add/get by address and a
//! mutable pointer. [`LocalStore`] is everything the local process owns:
//! identity, its own documents and manifest, follows and peer caches.

use async_trait::async_trait;
use bytes::Bytes;
use filux_core::{
    Blake3Hash, ContentAddress, Document, DocumentId, Ed25519PublicKey, FollowEntry, LocalCache,
    Manifest, PointerName, Profile, ThreadManifest,
};

use crate::error::Result;

/// Result of inserting a local document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Document was inserted.
    Inserted,
    /// The exact same document already exists (idempotent - not an error).
    AlreadyExists,
    /// A different document already holds this id.
    Conflict {
        /// Hash of the document already stored under the id.
        existing: Blake3Hash,
    },
}

/// The persisted identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    /// Ed25519 secret seed.
    pub seed: [u8; 32],
    pub display_name: String,
    pub created_at: i64,
}

/// What was last pushed for one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub id: DocumentId,
    /// Hash of the bytes pushed; a differing hash means "changed".
    pub content_hash: Blake3Hash,
    pub address: ContentAddress,
    pub published_at: i64,
    /// Pushed while the content store was local-only; peers cannot fetch
    /// it, so it is pushed again once a real store is reachable.
    pub local_only: bool,
}

/// The content-addressed store with a mutable pointer.
///
/// All operations are idempotent and safe to retry. An unreachable store
/// reports [`StoreError::Unavailable`](crate::StoreError::Unavailable).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Add bytes, returning their content address.
    async fn add(&self, bytes: Bytes) -> Result<ContentAddress>;

    /// Get the bytes at `address`, or `None` if nothing is there.
    async fn get(&self, address: &ContentAddress) -> Result<Option<Bytes>>;

    /// Point `pointer` at `address`.
    async fn publish(&self, pointer: &PointerName, address: &ContentAddress) -> Result<()>;

    /// Resolve `pointer` to the address it currently names.
    async fn resolve(&self, pointer: &PointerName) -> Result<Option<ContentAddress>>;

    /// True when addresses are not retrievable by peers.
    fn is_local_only(&self) -> bool {
        false
    }
}

/// Local persistence for one identity.
///
/// Lookups return `Ok(None)` for absent records; removals report whether
/// anything was removed.
#[async_trait]
pub trait LocalStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity & Profile
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the initialized identity, if any.
    async fn load_identity(&self) -> Result<Option<StoredIdentity>>;

    /// Persist the identity. Overwrites.
    async fn save_identity(&self, identity: &StoredIdentity) -> Result<()>;

    async fn get_profile(&self) -> Result<Option<Profile>>;

    async fn put_profile(&self, profile: &Profile) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Own Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a locally authored document.
    ///
    /// # Returns
    /// - `Inserted` if the id was unused.
    /// - `AlreadyExists` if the identical document is stored.
    /// - `Conflict` if a different document holds the id.
    async fn insert_document(&self, document: &Document) -> Result<InsertResult>;

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// All local documents ordered by `(timestamp, id)`.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn remove_document(&self, id: &DocumentId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Manifest & Publish State
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_manifest(&self) -> Result<Option<Manifest>>;

    async fn put_manifest(&self, manifest: &Manifest) -> Result<()>;

    async fn get_publish_record(&self, id: &DocumentId) -> Result<Option<PublishRecord>>;

    async fn list_publish_records(&self) -> Result<Vec<PublishRecord>>;

    async fn put_publish_record(&self, record: &PublishRecord) -> Result<()>;

    async fn remove_publish_record(&self, id: &DocumentId) -> Result<bool>;

    /// Store the outcome of a publish: the new manifest, the records of
    /// everything pushed, and the records of removed entries dropped.
    ///
    /// Backends with transactions override this to make it atomic.
    async fn commit_publish(
        &self,
        manifest: &Manifest,
        records: &[PublishRecord],
        removed: &[DocumentId],
    ) -> Result<()> {
        self.put_manifest(manifest).await?;
        for record in records {
            self.put_publish_record(record).await?;
        }
        for id in removed {
            self.remove_publish_record(id).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Threads
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_thread(&self, thread_id: &DocumentId) -> Result<Option<ThreadManifest>>;

    async fn put_thread(&self, thread: &ThreadManifest) -> Result<()>;

    /// All held thread manifests ordered by thread id.
    async fn list_threads(&self) -> Result<Vec<ThreadManifest>>;

    /// Mark a thread as followed. Idempotent.
    async fn follow_thread(&self, thread_id: &DocumentId, at: i64) -> Result<()>;

    async fn unfollow_thread(&self, thread_id: &DocumentId) -> Result<bool>;

    async fn list_followed_threads(&self) -> Result<Vec<DocumentId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Follows & Peer Caches
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_follow(&self, pubkey: &Ed25519PublicKey) -> Result<Option<FollowEntry>>;

    /// All follows ordered by pubkey.
    async fn list_follows(&self) -> Result<Vec<FollowEntry>>;

    /// Insert or replace the entry keyed by its pubkey.
    async fn put_follow(&self, entry: &FollowEntry) -> Result<()>;

    async fn remove_follow(&self, pubkey: &Ed25519PublicKey) -> Result<bool>;

    async fn get_cache(&self, owner: &Ed25519PublicKey) -> Result<Option<LocalCache>>;

    /// All peer caches ordered by owner.
    async fn list_caches(&self) -> Result<Vec<LocalCache>>;

    async fn put_cache(&self, cache: &LocalCache) -> Result<()>;

    async fn remove_cache(&self, owner: &Ed25519PublicKey) -> Result<bool>;
}
