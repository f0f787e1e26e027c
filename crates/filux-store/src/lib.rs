//! # Filux Store
//!
//! Storage for filux. Two seams, both async traits:
//!
//! - [`ContentStore`] - the content-addressed network capability
//!   (add/get by address, publish/resolve a mutable pointer)
//! - [`LocalStore`] - what the local process owns: identity, own documents,
//!   the manifest, publish records, threads, follows and peer caches
//!
//! ## Implementations
//!
//! - [`SqliteStore`] - SQLite-backed [`LocalStore`], and a local-only
//!   [`ContentStore`] that persists the mock address space
//! - [`MemoryStore`] - in-memory [`LocalStore`] for tests
//! - [`MemoryContentStore`] - in-memory [`ContentStore`] with fault switches;
//!   share one between nodes to model peers on one network
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use filux_store::{ContentStore, SqliteStore};
//!
//! async fn example() -> filux_store::Result<()> {
//!     let store = SqliteStore::open("filux.db")?;
//!     let address = store.add(Bytes::from_static(b"{}")).await?;
//!     assert!(store.get(&address).await?.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Inserting the same document twice returns `AlreadyExists`
//! - **Conflict detection**: A different document under a used id returns `Conflict`
//! - **Absent is not an error**: lookups return `Ok(None)`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryContentStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{ContentStore, InsertResult, LocalStore, PublishRecord, StoredIdentity};
