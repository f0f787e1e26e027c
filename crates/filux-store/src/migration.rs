//! Database schema migrations for SQLite.
//!
//! Each migration transforms the schema from version N to N+1. Structured
//! values (documents, manifests, caches) are stored as JSON text in the same
//! shape peers exchange them.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{} is newer than supported v{}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, filux_core::now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// v1: identity, documents, publish state, follows, caches, threads and
/// the local-only content space.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- The local identity: at most one row
        CREATE TABLE identity (
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            seed BLOB NOT NULL,               -- 32 bytes, Ed25519 secret seed
            display_name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE profile (
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            body TEXT NOT NULL                -- signed profile JSON
        );

        -- Locally authored documents
        CREATE TABLE documents (
            id BLOB PRIMARY KEY,              -- 16 bytes, derive_id output
            timestamp INTEGER NOT NULL,       -- author-claimed (Unix ms)
            kind TEXT NOT NULL,
            thread_id BLOB,                   -- 16 bytes, nullable
            content_hash BLOB NOT NULL,       -- 32 bytes, document_hash
            body TEXT NOT NULL                -- signed document JSON
        );

        CREATE TABLE manifest (
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            version TEXT NOT NULL,            -- dotted 4-component version
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- What was last pushed per manifest entry
        CREATE TABLE publish_records (
            id BLOB PRIMARY KEY,
            content_hash BLOB NOT NULL,
            address TEXT NOT NULL,
            published_at INTEGER NOT NULL,
            local_only INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE threads (
            thread_id BLOB PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE followed_threads (
            thread_id BLOB PRIMARY KEY,
            followed_at INTEGER NOT NULL
        );

        CREATE TABLE follows (
            pubkey BLOB PRIMARY KEY,          -- 32 bytes
            body TEXT NOT NULL
        );

        -- Per-peer read caches, documents split out
        CREATE TABLE peer_caches (
            owner BLOB PRIMARY KEY,
            manifest_version TEXT,            -- NULL until first merge
            entries TEXT NOT NULL,            -- JSON list of held entries
            profile TEXT,
            refreshed_at INTEGER NOT NULL
        );

        CREATE TABLE cached_documents (
            owner BLOB NOT NULL,
            id BLOB NOT NULL,
            address TEXT NOT NULL,
            verified INTEGER NOT NULL,        -- 1 = verified, 0 = allowed unverified
            fetched_at INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (owner, id)
        );

        -- Local-only content address space
        CREATE TABLE content_blobs (
            address TEXT PRIMARY KEY,
            bytes BLOB NOT NULL,
            added_at INTEGER NOT NULL
        );

        CREATE TABLE pointers (
            name TEXT PRIMARY KEY,
            address TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX idx_documents_timestamp ON documents(timestamp, id);
        CREATE INDEX idx_documents_thread ON documents(thread_id);
        CREATE INDEX idx_cached_documents_owner ON cached_documents(owner);
        "#,
    )?;

    Ok(())
}
