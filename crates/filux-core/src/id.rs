//! Deterministic identifiers.
//!
//! A document id is `blake3(DOMAIN || pubkey || timestamp_be || content)`
//! truncated to 16 bytes:
//!
//! | bytes | field |
//! |---|---|
//! | 17 | `b"filux-post-id-v0:"` |
//! | 32 | author public key |
//! | 8  | timestamp, i64 milliseconds, big-endian |
//! | n  | content, UTF-8 as given (no trimming) |
//!
//! Identical inputs always collide; callers perturb the timestamp to mint a
//! distinct id for identical content.
//!
//! Records that change over time (profile, thread manifests) use ids derived
//! from a stable key instead, so their manifest entry survives edits.

use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::CoreError;
use crate::manifest::Manifest;
use crate::types::{ContentAddress, DocumentId};

const POST_ID_DOMAIN: &[u8] = b"filux-post-id-v0:";
const PROFILE_ID_DOMAIN: &[u8] = b"filux-profile-id-v0:";
const THREAD_MANIFEST_ID_DOMAIN: &[u8] = b"filux-thread-manifest-id-v0:";

/// Derive the id of a document from its authorship metadata.
pub fn derive_id(pubkey: &Ed25519PublicKey, timestamp: i64, content: &str) -> DocumentId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(POST_ID_DOMAIN);
    hasher.update(pubkey.as_bytes());
    hasher.update(&timestamp.to_be_bytes());
    hasher.update(content.as_bytes());
    DocumentId::from_hash(&Blake3Hash(*hasher.finalize().as_bytes()))
}

/// The stable manifest id of an identity's profile.
pub fn profile_id(pubkey: &Ed25519PublicKey) -> DocumentId {
    DocumentId::from_hash(&Blake3Hash::hash_with_domain(PROFILE_ID_DOMAIN, pubkey.as_bytes()))
}

/// The stable manifest id of the thread manifest for `thread_id`.
///
/// Distinct from `thread_id` itself, which is the root post's entry.
pub fn thread_manifest_id(thread_id: &DocumentId) -> DocumentId {
    DocumentId::from_hash(&Blake3Hash::hash_with_domain(
        THREAD_MANIFEST_ID_DOMAIN,
        thread_id.as_bytes(),
    ))
}

/// Look up where `id` currently lives in the content store.
///
/// This is a manifest lookup, never a derivation: addresses are only known
/// after a successful publish.
pub fn id_to_address<'a>(
    id: &DocumentId,
    manifest: &'a Manifest,
) -> Result<&'a ContentAddress, CoreError> {
    match manifest.entry(id) {
        Some(entry) => entry
            .address
            .as_ref()
            .ok_or_else(|| CoreError::NotFound(format!("{} has not been published", id))),
        None => Err(CoreError::NotFound(format!("{} is not in the manifest", id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::manifest::{EntryKind, ManifestEntry};
    use proptest::prelude::*;

    fn alice() -> Ed25519PublicKey {
        Keypair::from_seed(&[0x42; 32]).public_key()
    }

    #[test]
    fn test_each_input_changes_id() {
        let base = derive_id(&alice(), 1_700_000_000_000, "hello");
        let other_key = Keypair::from_seed(&[0x43; 32]).public_key();

        assert_ne!(base, derive_id(&other_key, 1_700_000_000_000, "hello"));
        assert_ne!(base, derive_id(&alice(), 1_700_000_000_001, "hello"));
        assert_ne!(base, derive_id(&alice(), 1_700_000_000_000, "hello "));
    }

    #[test]
    fn test_id_renders_as_32_hex_chars() {
        let id = derive_id(&alice(), 0, "");
        assert_eq!(id.to_hex().len(), 32);
    }

    #[test]
    fn test_stable_ids_are_disjoint() {
        let pk = alice();
        let root = derive_id(&pk, 5, "root");
        assert_ne!(profile_id(&pk), root);
        assert_ne!(thread_manifest_id(&root), root);
        assert_eq!(thread_manifest_id(&root), thread_manifest_id(&root));
    }

    #[test]
    fn test_id_to_address() {
        let pk = alice();
        let published = derive_id(&pk, 1, "published");
        let pending = derive_id(&pk, 2, "pending");
        let absent = derive_id(&pk, 3, "absent");
        let address = ContentAddress::mock_for(b"published");

        let mut manifest = Manifest::new(pk);
        manifest.record(published, address.clone(), EntryKind::Post, 1);
        manifest.entries.push(ManifestEntry {
            id: pending,
            address: None,
            kind: EntryKind::Post,
            added_at: 2,
        });

        assert_eq!(id_to_address(&published, &manifest).unwrap(), &address);
        assert!(matches!(
            id_to_address(&pending, &manifest),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            id_to_address(&absent, &manifest),
            Err(CoreError::NotFound(_))
        ));
    }

    proptest! {
        #[test]
        fn derive_id_is_deterministic(seed in any::<[u8; 32]>(), ts in any::<i64>(), content in ".{0,200}") {
            let pk = Keypair::from_seed(&seed).public_key();
            prop_assert_eq!(derive_id(&pk, ts, &content), derive_id(&pk, ts, &content));
        }
    }
}
