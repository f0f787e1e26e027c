//! In-memory implementations of the store traits.
//!
//! [`MemoryStore`] has the same semantics as SQLite with no persistence.
//! [`MemoryContentStore`] stands in for the content network; share one
//! instance between several nodes to model peers on the same network.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use filux_core::{
    document_hash, ContentAddress, Document, DocumentId, Ed25519PublicKey, FollowEntry,
    LocalCache, Manifest, PointerName, Profile, ThreadManifest,
};

use crate::error::{Result, StoreError};
use crate::traits::{ContentStore, InsertResult, LocalStore, PublishRecord, StoredIdentity};

/// In-memory local store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    identity: Option<StoredIdentity>,
    profile: Option<Profile>,
    documents: HashMap<DocumentId, Document>,
    manifest: Option<Manifest>,
    publish_records: BTreeMap<DocumentId, PublishRecord>,
    threads: BTreeMap<DocumentId, ThreadManifest>,
    followed_threads: BTreeMap<DocumentId, i64>,
    follows: BTreeMap<Ed25519PublicKey, FollowEntry>,
    caches: BTreeMap<Ed25519PublicKey, LocalCache>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryStoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn load_identity(&self) -> Result<Option<StoredIdentity>> {
        Ok(self.read().identity.clone())
    }

    async fn save_identity(&self, identity: &StoredIdentity) -> Result<()> {
        self.write().identity = Some(identity.clone());
        Ok(())
    }

    async fn get_profile(&self) -> Result<Option<Profile>> {
        Ok(self.read().profile.clone())
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.write().profile = Some(profile.clone());
        Ok(())
    }

    async fn insert_document(&self, document: &Document) -> Result<InsertResult> {
        let mut inner = self.write();
        if let Some(existing) = inner.documents.get(&document.id) {
            let existing = document_hash(existing);
            if existing == document_hash(document) {
                return Ok(InsertResult::AlreadyExists);
            }
            return Ok(InsertResult::Conflict { existing });
        }
        inner.documents.insert(document.id, document.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        Ok(self.read().documents.get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut documents: Vec<Document> = self.read().documents.values().cloned().collect();
        documents.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        Ok(documents)
    }

    async fn remove_document(&self, id: &DocumentId) -> Result<bool> {
        Ok(self.write().documents.remove(id).is_some())
    }

    async fn get_manifest(&self) -> Result<Option<Manifest>> {
        Ok(self.read().manifest.clone())
    }

    async fn put_manifest(&self, manifest: &Manifest) -> Result<()> {
        self.write().manifest = Some(manifest.clone());
        Ok(())
    }

    async fn get_publish_record(&self, id: &DocumentId) -> Result<Option<PublishRecord>> {
        Ok(self.read().publish_records.get(id).cloned())
    }

    async fn list_publish_records(&self) -> Result<Vec<PublishRecord>> {
        Ok(self.read().publish_records.values().cloned().collect())
    }

    async fn put_publish_record(&self, record: &PublishRecord) -> Result<()> {
        self.write().publish_records.insert(record.id, record.clone());
        Ok(())
    }

    async fn remove_publish_record(&self, id: &DocumentId) -> Result<bool> {
        Ok(self.write().publish_records.remove(id).is_some())
    }

    async fn commit_publish(
        &self,
        manifest: &Manifest,
        records: &[PublishRecord],
        removed: &[DocumentId],
    ) -> Result<()> {
        // One guard for the whole commit.
        let mut inner = self.write();
        inner.manifest = Some(manifest.clone());
        for record in records {
            inner.publish_records.insert(record.id, record.clone());
        }
        for id in removed {
            inner.publish_records.remove(id);
        }
        Ok(())
    }

    async fn get_thread(&self, thread_id: &DocumentId) -> Result<Option<ThreadManifest>> {
        Ok(self.read().threads.get(thread_id).cloned())
    }

    async fn put_thread(&self, thread: &ThreadManifest) -> Result<()> {
        self.write().threads.insert(thread.thread_id, thread.clone());
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<ThreadManifest>> {
        Ok(self.read().threads.values().cloned().collect())
    }

    async fn follow_thread(&self, thread_id: &DocumentId, at: i64) -> Result<()> {
        self.write().followed_threads.entry(*thread_id).or_insert(at);
        Ok(())
    }

    async fn unfollow_thread(&self, thread_id: &DocumentId) -> Result<bool> {
        Ok(self.write().followed_threads.remove(thread_id).is_some())
    }

    async fn list_followed_threads(&self) -> Result<Vec<DocumentId>> {
        Ok(self.read().followed_threads.keys().copied().collect())
    }

    async fn get_follow(&self, pubkey: &Ed25519PublicKey) -> Result<Option<FollowEntry>> {
        Ok(self.read().follows.get(pubkey).cloned())
    }

    async fn list_follows(&self) -> Result<Vec<FollowEntry>> {
        Ok(self.read().follows.values().cloned().collect())
    }

    async fn put_follow(&self, entry: &FollowEntry) -> Result<()> {
        self.write().follows.insert(entry.pubkey, entry.clone());
        Ok(())
    }

    async fn remove_follow(&self, pubkey: &Ed25519PublicKey) -> Result<bool> {
        Ok(self.write().follows.remove(pubkey).is_some())
    }

    async fn get_cache(&self, owner: &Ed25519PublicKey) -> Result<Option<LocalCache>> {
        Ok(self.read().caches.get(owner).cloned())
    }

    async fn list_caches(&self) -> Result<Vec<LocalCache>> {
        Ok(self.read().caches.values().cloned().collect())
    }

    async fn put_cache(&self, cache: &LocalCache) -> Result<()> {
        self.write().caches.insert(cache.owner, cache.clone());
        Ok(())
    }

    async fn remove_cache(&self, owner: &Ed25519PublicKey) -> Result<bool> {
        Ok(self.write().caches.remove(owner).is_some())
    }
}

/// In-memory content store.
///
/// Addresses are [`ContentAddress::mock_for`] the bytes, so identical bytes
/// deduplicate. Besides the [`ContentStore`] capability it exposes counters
/// and fault switches for exercising sync behavior.
pub struct MemoryContentStore {
    inner: RwLock<ContentInner>,
    local_only: bool,
    available: AtomicBool,
    adds: AtomicUsize,
    gets: AtomicUsize,
    publishes: AtomicUsize,
    calls: AtomicUsize,
}

#[derive(Default)]
struct ContentInner {
    blobs: HashMap<ContentAddress, Bytes>,
    pointers: HashMap<PointerName, ContentAddress>,
    /// Pointer updates not yet visible to `resolve`.
    pending: Option<HashMap<PointerName, ContentAddress>>,
    failing: HashSet<ContentAddress>,
}

impl MemoryContentStore {
    /// A store whose addresses peers sharing this instance can fetch.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// A store that reports itself as local-only.
    pub fn local_only() -> Self {
        Self::build(true)
    }

    fn build(local_only: bool) -> Self {
        Self {
            inner: RwLock::new(ContentInner::default()),
            local_only,
            available: AtomicBool::new(true),
            adds: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            publishes: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ContentInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContentInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory content store is offline".into()))
        }
    }

    /// Take the store offline (`false`) or bring it back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Successful `add` plus `publish` calls so far.
    pub fn write_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst) + self.publishes.load(Ordering::SeqCst)
    }

    /// Successful `add` calls so far.
    pub fn add_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    /// Every capability call so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `get` calls that returned bytes so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.read().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.read().blobs.contains_key(address)
    }

    /// Delay pointer updates: `resolve` keeps returning the old address
    /// until [`release_pointers`](Self::release_pointers).
    pub fn hold_pointers(&self) {
        let mut inner = self.write();
        if inner.pending.is_none() {
            inner.pending = Some(HashMap::new());
        }
    }

    /// Apply held pointer updates.
    pub fn release_pointers(&self) {
        let mut inner = self.write();
        if let Some(pending) = inner.pending.take() {
            inner.pointers.extend(pending);
        }
    }

    /// Make `get` of one address time out.
    pub fn fail_address(&self, address: &ContentAddress) {
        self.write().failing.insert(address.clone());
    }

    pub fn heal_address(&self, address: &ContentAddress) {
        self.write().failing.remove(address);
    }

    /// Serve `bytes` at `address` regardless of their hash.
    pub fn overwrite(&self, address: &ContentAddress, bytes: impl Into<Bytes>) {
        self.write().blobs.insert(address.clone(), bytes.into());
    }

    /// Point `pointer` at `address` directly, bypassing availability.
    pub fn force_pointer(&self, pointer: &PointerName, address: &ContentAddress) {
        self.write().pointers.insert(pointer.clone(), address.clone());
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn add(&self, bytes: Bytes) -> Result<ContentAddress> {
        self.check_available()?;
        let address = ContentAddress::mock_for(&bytes);
        self.write().blobs.entry(address.clone()).or_insert(bytes);
        self.adds.fetch_add(1, Ordering::SeqCst);
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Bytes>> {
        self.check_available()?;
        let inner = self.read();
        if inner.failing.contains(address) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} is unreachable", address),
            )));
        }
        let bytes = inner.blobs.get(address).cloned();
        if bytes.is_some() {
            self.gets.fetch_add(1, Ordering::SeqCst);
        }
        Ok(bytes)
    }

    async fn publish(&self, pointer: &PointerName, address: &ContentAddress) -> Result<()> {
        self.check_available()?;
        let mut inner = self.write();
        match inner.pending.as_mut() {
            Some(pending) => {
                pending.insert(pointer.clone(), address.clone());
            }
            None => {
                inner.pointers.insert(pointer.clone(), address.clone());
            }
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resolve(&self, pointer: &PointerName) -> Result<Option<ContentAddress>> {
        self.check_available()?;
        Ok(self.read().pointers.get(pointer).cloned())
    }

    fn is_local_only(&self) -> bool {
        self.local_only
    }
}
