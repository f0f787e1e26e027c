//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. The same database
//! also serves as a local-only [`ContentStore`], so a node without a
//! reachable content network keeps its published state across restarts.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use filux_core::{
    document_hash, now_millis, Blake3Hash, CachedDocument, ContentAddress, Document, DocumentId,
    Ed25519PublicKey, FollowEntry, LocalCache, Manifest, ManifestEntry, ManifestVersion,
    PointerName, Profile, ThreadManifest,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ContentStore, InsertResult, LocalStore, PublishRecord, StoredIdentity};

/// SQLite-based store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}

fn id_from_blob(bytes: &[u8]) -> Result<DocumentId> {
    DocumentId::try_from(bytes)
        .map_err(|_| StoreError::InvalidData(format!("document id of {} bytes", bytes.len())))
}

fn hash_from_blob(bytes: &[u8]) -> Result<Blake3Hash> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("hash of {} bytes", bytes.len())))?;
    Ok(Blake3Hash::from_bytes(arr))
}

fn version_from_text(text: &str) -> Result<ManifestVersion> {
    text.parse()
        .map_err(|_| StoreError::InvalidData(format!("bad manifest version {:?}", text)))
}

fn load_cache(conn: &Connection, owner: &Ed25519PublicKey) -> Result<Option<LocalCache>> {
    let row: Option<(Option<String>, String, Option<String>, i64)> = conn
        .query_row(
            "SELECT manifest_version, entries, profile, refreshed_at
             FROM peer_caches WHERE owner = ?1",
            params![owner.as_bytes().as_slice()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((version, entries, profile, refreshed_at)) = row else {
        return Ok(None);
    };

    let mut cache = LocalCache::new(*owner);
    cache.manifest_version = version.as_deref().map(version_from_text).transpose()?;
    cache.entries = from_json::<Vec<ManifestEntry>>(&entries)?;
    cache.profile = profile.as_deref().map(from_json::<Profile>).transpose()?;
    cache.refreshed_at = refreshed_at;

    let mut stmt = conn.prepare(
        "SELECT address, verified, fetched_at, body FROM cached_documents WHERE owner = ?1",
    )?;
    let rows = stmt.query_map(params![owner.as_bytes().as_slice()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, bool>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (address, verified, fetched_at, body) = row?;
        let document: Document = from_json(&body)?;
        cache.documents.insert(
            document.id,
            CachedDocument {
                document,
                address: ContentAddress::new(address),
                verified,
                fetched_at,
            },
        );
    }

    Ok(Some(cache))
}

fn store_cache(tx: &Transaction<'_>, cache: &LocalCache) -> Result<()> {
    let owner = cache.owner.as_bytes().as_slice();
    tx.execute(
        "INSERT OR REPLACE INTO peer_caches (owner, manifest_version, entries, profile, refreshed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            owner,
            cache.manifest_version.map(|v| v.to_string()),
            to_json(&cache.entries)?,
            cache.profile.as_ref().map(to_json).transpose()?,
            cache.refreshed_at,
        ],
    )?;

    tx.execute("DELETE FROM cached_documents WHERE owner = ?1", params![owner])?;
    for (id, cached) in &cache.documents {
        tx.execute(
            "INSERT INTO cached_documents (owner, id, address, verified, fetched_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                owner,
                id.as_bytes().as_slice(),
                cached.address.as_str(),
                cached.verified,
                cached.fetched_at,
                to_json(&cached.document)?,
            ],
        )?;
    }
    Ok(())
}

fn store_publish_record(conn: &Connection, record: &PublishRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO publish_records (id, content_hash, address, published_at, local_only)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id.as_bytes().as_slice(),
            record.content_hash.as_bytes().as_slice(),
            record.address.as_str(),
            record.published_at,
            record.local_only,
        ],
    )?;
    Ok(())
}

fn store_manifest(conn: &Connection, manifest: &Manifest) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO manifest (slot, version, body, updated_at) VALUES (1, ?1, ?2, ?3)",
        params![
            manifest.manifest_version.to_string(),
            to_json(manifest)?,
            now_millis()
        ],
    )?;
    Ok(())
}

type PublishRecordRow = (Vec<u8>, Vec<u8>, String, i64, bool);

fn row_to_publish_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PublishRecordRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn publish_record_from_parts(parts: PublishRecordRow) -> Result<PublishRecord> {
    let (id, hash, address, published_at, local_only) = parts;
    Ok(PublishRecord {
        id: id_from_blob(&id)?,
        content_hash: hash_from_blob(&hash)?,
        address: ContentAddress::new(address),
        published_at,
        local_only,
    })
}

#[async_trait]
impl LocalStore for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity & Profile
    // ─────────────────────────────────────────────────────────────────────────

    async fn load_identity(&self) -> Result<Option<StoredIdentity>> {
        self.run(|conn| {
            let row: Option<(Vec<u8>, String, i64)> = conn
                .query_row(
                    "SELECT seed, display_name, created_at FROM identity WHERE slot = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            row.map(|(seed, display_name, created_at)| -> Result<StoredIdentity> {
                let seed: [u8; 32] = seed.as_slice().try_into().map_err(|_| {
                    StoreError::InvalidData(format!("identity seed of {} bytes", seed.len()))
                })?;
                Ok(StoredIdentity {
                    seed,
                    display_name,
                    created_at,
                })
            })
            .transpose()
        })
        .await
    }

    async fn save_identity(&self, identity: &StoredIdentity) -> Result<()> {
        let identity = identity.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO identity (slot, seed, display_name, created_at)
                 VALUES (1, ?1, ?2, ?3)",
                params![
                    identity.seed.as_slice(),
                    identity.display_name,
                    identity.created_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_profile(&self) -> Result<Option<Profile>> {
        self.run(|conn| {
            let body: Option<String> = conn
                .query_row("SELECT body FROM profile WHERE slot = 1", [], |row| row.get(0))
                .optional()?;
            body.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        let body = to_json(profile)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO profile (slot, body) VALUES (1, ?1)",
                params![body],
            )?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Own Documents
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_document(&self, document: &Document) -> Result<InsertResult> {
        let id = document.id;
        let hash = document_hash(document);
        let timestamp = document.timestamp;
        let kind = document.kind.as_str();
        let thread_id = document.thread_id;
        let body = to_json(document)?;

        self.run(move |conn| {
            let existing: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT content_hash FROM documents WHERE id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing) = existing {
                let existing = hash_from_blob(&existing)?;
                if existing == hash {
                    return Ok(InsertResult::AlreadyExists);
                }
                return Ok(InsertResult::Conflict { existing });
            }

            conn.execute(
                "INSERT INTO documents (id, timestamp, kind, thread_id, content_hash, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_bytes().as_slice(),
                    timestamp,
                    kind,
                    thread_id.map(|t| t.as_bytes().to_vec()),
                    hash.as_bytes().as_slice(),
                    body,
                ],
            )?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        let id = *id;
        self.run(move |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            body.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT body FROM documents ORDER BY timestamp, id")?;
            let bodies = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            bodies.iter().map(|b| from_json(b)).collect()
        })
        .await
    }

    async fn remove_document(&self, id: &DocumentId) -> Result<bool> {
        let id = *id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM documents WHERE id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Manifest & Publish State
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_manifest(&self) -> Result<Option<Manifest>> {
        self.run(|conn| {
            let body: Option<String> = conn
                .query_row("SELECT body FROM manifest WHERE slot = 1", [], |row| row.get(0))
                .optional()?;
            body.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn put_manifest(&self, manifest: &Manifest) -> Result<()> {
        let manifest = manifest.clone();
        self.run(move |conn| store_manifest(conn, &manifest)).await
    }

    async fn get_publish_record(&self, id: &DocumentId) -> Result<Option<PublishRecord>> {
        let id = *id;
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, content_hash, address, published_at, local_only FROM publish_records WHERE id = ?1",
                params![id.as_bytes().as_slice()],
                row_to_publish_record,
            )
            .optional()?
            .map(publish_record_from_parts)
            .transpose()
        })
        .await
    }

    async fn list_publish_records(&self) -> Result<Vec<PublishRecord>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content_hash, address, published_at, local_only
                 FROM publish_records ORDER BY id",
            )?;
            let parts = stmt
                .query_map([], row_to_publish_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            parts.into_iter().map(publish_record_from_parts).collect()
        })
        .await
    }

    async fn put_publish_record(&self, record: &PublishRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| store_publish_record(conn, &record)).await
    }

    async fn remove_publish_record(&self, id: &DocumentId) -> Result<bool> {
        let id = *id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM publish_records WHERE id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn commit_publish(
        &self,
        manifest: &Manifest,
        records: &[PublishRecord],
        removed: &[DocumentId],
    ) -> Result<()> {
        let manifest = manifest.clone();
        let records = records.to_vec();
        let removed = removed.to_vec();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            store_manifest(&tx, &manifest)?;
            for record in &records {
                store_publish_record(&tx, record)?;
            }
            for id in &removed {
                tx.execute(
                    "DELETE FROM publish_records WHERE id = ?1",
                    params![id.as_bytes().as_slice()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Threads
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_thread(&self, thread_id: &DocumentId) -> Result<Option<ThreadManifest>> {
        let thread_id = *thread_id;
        self.run(move |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM threads WHERE thread_id = ?1",
                    params![thread_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            body.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn put_thread(&self, thread: &ThreadManifest) -> Result<()> {
        let thread_id = thread.thread_id;
        let body = to_json(thread)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO threads (thread_id, body, updated_at) VALUES (?1, ?2, ?3)",
                params![thread_id.as_bytes().as_slice(), body, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_threads(&self) -> Result<Vec<ThreadManifest>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT body FROM threads ORDER BY thread_id")?;
            let bodies = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            bodies.iter().map(|b| from_json(b)).collect()
        })
        .await
    }

    async fn follow_thread(&self, thread_id: &DocumentId, at: i64) -> Result<()> {
        let thread_id = *thread_id;
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO followed_threads (thread_id, followed_at) VALUES (?1, ?2)",
                params![thread_id.as_bytes().as_slice(), at],
            )?;
            Ok(())
        })
        .await
    }

    async fn unfollow_thread(&self, thread_id: &DocumentId) -> Result<bool> {
        let thread_id = *thread_id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM followed_threads WHERE thread_id = ?1",
                params![thread_id.as_bytes().as_slice()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_followed_threads(&self) -> Result<Vec<DocumentId>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT thread_id FROM followed_threads ORDER BY thread_id")?;
            let blobs = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            blobs.iter().map(|b| id_from_blob(b)).collect()
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Follows & Peer Caches
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_follow(&self, pubkey: &Ed25519PublicKey) -> Result<Option<FollowEntry>> {
        let pubkey = *pubkey;
        self.run(move |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM follows WHERE pubkey = ?1",
                    params![pubkey.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            body.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn list_follows(&self) -> Result<Vec<FollowEntry>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT body FROM follows ORDER BY pubkey")?;
            let bodies = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            bodies.iter().map(|b| from_json(b)).collect()
        })
        .await
    }

    async fn put_follow(&self, entry: &FollowEntry) -> Result<()> {
        let pubkey = entry.pubkey;
        let body = to_json(entry)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO follows (pubkey, body) VALUES (?1, ?2)",
                params![pubkey.as_bytes().as_slice(), body],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_follow(&self, pubkey: &Ed25519PublicKey) -> Result<bool> {
        let pubkey = *pubkey;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM follows WHERE pubkey = ?1",
                params![pubkey.as_bytes().as_slice()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn get_cache(&self, owner: &Ed25519PublicKey) -> Result<Option<LocalCache>> {
        let owner = *owner;
        self.run(move |conn| load_cache(conn, &owner)).await
    }

    async fn list_caches(&self) -> Result<Vec<LocalCache>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT owner FROM peer_caches ORDER BY owner")?;
            let owners = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut caches = Vec::with_capacity(owners.len());
            for owner in owners {
                let owner: [u8; 32] = owner.as_slice().try_into().map_err(|_| {
                    StoreError::InvalidData(format!("cache owner of {} bytes", owner.len()))
                })?;
                if let Some(cache) = load_cache(conn, &Ed25519PublicKey::from_bytes(owner))? {
                    caches.push(cache);
                }
            }
            Ok(caches)
        })
        .await
    }

    async fn put_cache(&self, cache: &LocalCache) -> Result<()> {
        let cache = cache.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            store_cache(&tx, &cache)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove_cache(&self, owner: &Ed25519PublicKey) -> Result<bool> {
        let owner = *owner;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM cached_documents WHERE owner = ?1",
                params![owner.as_bytes().as_slice()],
            )?;
            let n = tx.execute(
                "DELETE FROM peer_caches WHERE owner = ?1",
                params![owner.as_bytes().as_slice()],
            )?;
            tx.commit()?;
            Ok(n > 0)
        })
        .await
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn add(&self, bytes: Bytes) -> Result<ContentAddress> {
        let address = ContentAddress::mock_for(&bytes);
        let key = address.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO content_blobs (address, bytes, added_at) VALUES (?1, ?2, ?3)",
                params![key.as_str(), bytes.as_ref(), now_millis()],
            )?;
            Ok(())
        })
        .await?;
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Bytes>> {
        let address = address.clone();
        self.run(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT bytes FROM content_blobs WHERE address = ?1",
                    params![address.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(bytes.map(Bytes::from))
        })
        .await
    }

    async fn publish(&self, pointer: &PointerName, address: &ContentAddress) -> Result<()> {
        let pointer = pointer.clone();
        let address = address.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO pointers (name, address, updated_at) VALUES (?1, ?2, ?3)",
                params![pointer.as_str(), address.as_str(), now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn resolve(&self, pointer: &PointerName) -> Result<Option<ContentAddress>> {
        let pointer = pointer.clone();
        self.run(move |conn| {
            let address: Option<String> = conn
                .query_row(
                    "SELECT address FROM pointers WHERE name = ?1",
                    params![pointer.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(address.map(ContentAddress::new))
        })
        .await
    }

    fn is_local_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filux_core::{DocumentBuilder, DocumentKind, EntryKind, Identity, Keypair};

    fn make_doc(keypair: &Keypair, ts: i64, content: &str) -> Document {
        DocumentBuilder::new(keypair.public_key(), "alice")
            .timestamp(ts)
            .content(content)
            .sign(keypair)
    }

    #[tokio::test]
    async fn test_insert_and_get_document() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let doc = make_doc(&keypair, 1_700_000_000_000, "hello");

        let result = store.insert_document(&doc).await.unwrap();
        assert_eq!(result, InsertResult::Inserted);

        let retrieved = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(retrieved, doc);
    }

    #[tokio::test]
    async fn test_idempotent_insert() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let doc = make_doc(&keypair, 1, "hello");

        assert_eq!(store.insert_document(&doc).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.insert_document(&doc).await.unwrap(), InsertResult::AlreadyExists);
    }

    #[tokio::test]
    async fn test_conflict_detection() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let doc = make_doc(&keypair, 1, "same");
        let reaction = DocumentBuilder::new(keypair.public_key(), "alice")
            .timestamp(1)
            .content("same")
            .kind(DocumentKind::Reaction)
            .reply_to(DocumentId::from_bytes([9; 16]))
            .sign(&keypair);
        assert_eq!(doc.id, reaction.id);

        store.insert_document(&doc).await.unwrap();
        let result = store.insert_document(&reaction).await.unwrap();
        assert_eq!(
            result,
            InsertResult::Conflict {
                existing: document_hash(&doc)
            }
        );
    }

    #[tokio::test]
    async fn test_identity_and_profile() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load_identity().await.unwrap().is_none());

        let keypair = Keypair::from_seed(&[7; 32]);
        let stored = StoredIdentity {
            seed: keypair.seed(),
            display_name: "alice".into(),
            created_at: 42,
        };
        store.save_identity(&stored).await.unwrap();
        assert_eq!(store.load_identity().await.unwrap(), Some(stored));

        let identity = Identity::new(keypair, "alice").unwrap();
        let profile = Profile::signed(&identity, "hi", 42);
        store.put_profile(&profile).await.unwrap();
        assert_eq!(store.get_profile().await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_commit_publish_is_atomic_unit() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let doc = make_doc(&keypair, 1, "hello");
        let address = ContentAddress::mock_for(b"hello");

        let mut manifest = Manifest::new(keypair.public_key());
        manifest.record(doc.id, address.clone(), EntryKind::Post, 1);
        manifest.bump_version();
        manifest.sign(&keypair).unwrap();

        let record = PublishRecord {
            id: doc.id,
            content_hash: document_hash(&doc),
            address,
            published_at: 1,
            local_only: true,
        };
        store
            .commit_publish(&manifest, std::slice::from_ref(&record), &[])
            .await
            .unwrap();

        assert_eq!(store.get_manifest().await.unwrap(), Some(manifest));
        assert_eq!(store.list_publish_records().await.unwrap(), vec![record]);

        store.commit_publish(&Manifest::new(keypair.public_key()), &[], &[doc.id]).await.unwrap();
        assert!(store.get_publish_record(&doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_round_trips_through_tables() {
        let store = SqliteStore::open_memory().unwrap();
        let bob = Keypair::from_seed(&[2; 32]);
        let doc = DocumentBuilder::new(bob.public_key(), "bob")
            .timestamp(5)
            .content("hi")
            .sign(&bob);

        let mut manifest = Manifest::new(bob.public_key());
        manifest.record(doc.id, ContentAddress::mock_for(b"hi"), EntryKind::Post, 5);
        manifest.bump_version();

        let mut cache = LocalCache::new(bob.public_key());
        cache.insert_document(manifest.entries[0].clone(), doc, true, 9);
        cache.manifest_version = Some(manifest.manifest_version);
        cache.refreshed_at = 9;

        store.put_cache(&cache).await.unwrap();
        assert_eq!(store.get_cache(&bob.public_key()).await.unwrap(), Some(cache.clone()));
        assert_eq!(store.list_caches().await.unwrap(), vec![cache]);

        assert!(store.remove_cache(&bob.public_key()).await.unwrap());
        assert!(store.get_cache(&bob.public_key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_threads_and_followed_threads() {
        let store = SqliteStore::open_memory().unwrap();
        let thread_id = DocumentId::from_bytes([3; 16]);
        let mut thread = ThreadManifest::new(thread_id);
        thread.title = "Rust".into();

        store.put_thread(&thread).await.unwrap();
        assert_eq!(store.get_thread(&thread_id).await.unwrap(), Some(thread.clone()));
        assert_eq!(store.list_threads().await.unwrap(), vec![thread]);

        store.follow_thread(&thread_id, 1).await.unwrap();
        store.follow_thread(&thread_id, 2).await.unwrap();
        assert_eq!(store.list_followed_threads().await.unwrap(), vec![thread_id]);
        assert!(store.unfollow_thread(&thread_id).await.unwrap());
        assert!(store.list_followed_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_content_space() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.is_local_only());

        let a = store.add(Bytes::from_static(b"manifest")).await.unwrap();
        let b = store.add(Bytes::from_static(b"manifest")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.get(&a).await.unwrap(), Some(Bytes::from_static(b"manifest")));

        let pointer = PointerName::new("k51local");
        assert!(store.resolve(&pointer).await.unwrap().is_none());
        store.publish(&pointer, &a).await.unwrap();
        assert_eq!(store.resolve(&pointer).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filux.db");
        let keypair = Keypair::generate();
        let doc = make_doc(&keypair, 1, "persisted");

        let pointer = PointerName::for_identity(&keypair.public_key());
        let address;
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_document(&doc).await.unwrap();
            address = store.add(Bytes::from_static(b"blob")).await.unwrap();
            store.publish(&pointer, &address).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_documents().await.unwrap(), vec![doc]);
        assert_eq!(store.resolve(&pointer).await.unwrap(), Some(address));
    }
}
