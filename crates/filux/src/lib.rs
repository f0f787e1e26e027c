//! # Filux
//!
//! Publish signed content under a self-certifying identity and follow
//! other identities through a shared content-addressed store.
//!
//! ## Overview
//!
//! - **Documents**: Signed posts, replies, reactions, reposts and thread roots
//! - **Manifests**: Each identity's versioned, signed index of its records
//! - **Publish**: Push only what changed, then move the identity's pointer
//! - **Follow-sync**: Fetch only what a peer's manifest adds, verifying all of it
//!
//! ## Key Concepts
//!
//! - **Identity**: An Ed25519 key. Display names are advisory and may collide.
//! - **Document id**: Derived once from `(pubkey, timestamp, content)`; never
//!   confused with the content address the store assigns.
//! - **Pointer**: A mutable name, derived from the pubkey, that resolves to
//!   the latest manifest.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use filux::{Node, NodeConfig};
//! use filux::store::{MemoryContentStore, SqliteStore};
//! use filux::sync::{PublishOptions, SyncFollowedOptions};
//!
//! async fn example() -> filux::Result<()> {
//!     let local = Arc::new(SqliteStore::open("filux.db")?);
//!     let content = Arc::new(MemoryContentStore::new());
//!
//!     let node = Node::init(local, content, "alice", NodeConfig::default()).await?;
//!     node.post("hello").await?;
//!
//!     let report = node.publish(&PublishOptions::default()).await?;
//!     println!("published {} entries", report.published.len());
//!
//!     let report = node.sync_followed(&SyncFollowedOptions::default()).await?;
//!     println!("fetched {} documents", report.fetched_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `filux::core` - Identities, documents, manifests, threads
//! - `filux::store` - Local and content store traits and backends
//! - `filux::sync` - Publisher, follow-sync engine and their reports

pub mod error;
pub mod node;
pub mod view;

pub use filux_core as core;
pub use filux_store as store;
pub use filux_sync as sync;

pub use error::{NodeError, Result};
pub use node::{Node, NodeConfig};
pub use view::{FeedItem, Resolved, ThreadView};

pub use filux_core::{
    Collision, ContentAddress, Document, DocumentId, DocumentKind, Ed25519PublicKey, FollowEntry,
    Identity, Keypair, Link, Manifest, ManifestVersion, Profile, ThreadManifest,
};
