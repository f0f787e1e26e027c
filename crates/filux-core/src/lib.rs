//! # Filux Core
//!
//! Pure primitives for filux: identities, signed documents, manifests,
//! thread reconciliation and display-name collision detection.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over signed data structures.
//!
//! ## Key Types
//!
//! - [`Identity`] - A keypair plus display name; equality is by public key
//! - [`Document`] - A signed post, reaction, repost or thread root
//! - [`DocumentId`] - Deterministic id derived by [`derive_id`]
//! - [`Manifest`] - Versioned, signed index of an identity's published records
//! - [`ManifestVersion`] - Four-component version with carry-on-overflow `bump`
//! - [`ThreadManifest`] - Shared thread metadata with a grow-only participant set
//! - [`LocalCache`] - What we hold of a followed identity
//!
//! ## Two key spaces
//!
//! A [`DocumentId`] never changes once derived. A [`ContentAddress`] is wherever
//! the content store put the bytes. They meet only inside a [`Manifest`]; see
//! [`id_to_address`].
//!
//! ## Canonicalization
//!
//! Signatures cover a deterministic CBOR encoding. See [`canonical`] module.

pub mod cache;
pub mod canonical;
pub mod collision;
pub mod crypto;
pub mod document;
pub mod error;
pub mod follow;
pub mod id;
pub mod identity;
pub mod link;
pub mod manifest;
pub mod profile;
pub mod thread;
pub mod types;
pub mod validation;
pub mod version;

pub use cache::{CachedDocument, LocalCache};
pub use canonical::{document_hash, document_signing_bytes, manifest_signing_bytes};
pub use collision::{check as check_collision, normalize_display_name, Collision};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use document::{Document, DocumentBuilder, DocumentKind};
pub use error::{CoreError, ValidationError};
pub use follow::FollowEntry;
pub use id::{derive_id, id_to_address, profile_id, thread_manifest_id};
pub use identity::Identity;
pub use link::Link;
pub use manifest::{EntryChange, EntryKind, Manifest, ManifestEntry};
pub use profile::Profile;
pub use thread::ThreadManifest;
pub use types::{ContentAddress, DocumentId, PointerName};
pub use validation::{verify_document, verify_document_from};
pub use version::ManifestVersion;

/// Current time in Unix milliseconds, the unit of every timestamp here.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
