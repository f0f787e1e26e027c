//! Convergence checks between a local cache and a peer's manifest.
//!
//! A cache has converged with a manifest when it holds exactly the
//! manifest's addressed entries at the listed addresses. Two nodes can
//! compare state hashes instead of exchanging entry lists.

use filux_core::{Blake3Hash, DocumentId, Ed25519PublicKey, LocalCache, Manifest, ManifestEntry};
use filux_store::LocalStore;

use crate::error::Result;

const STATE_DOMAIN: &[u8] = b"filux-cache-state-v0:";

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// The cache holds exactly what the manifest lists.
    Converged,
    /// The manifest lists entries the cache lacks or holds at a stale address.
    Behind { missing: Vec<DocumentId> },
    /// The cache holds entries the manifest no longer lists.
    Ahead { extra: Vec<DocumentId> },
}

impl ConvergenceResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare `cache` against `manifest`. Missing entries win over extras.
pub fn verify_cache_convergence(cache: &LocalCache, manifest: &Manifest) -> ConvergenceResult {
    let missing: Vec<DocumentId> = cache
        .missing_entries(manifest)
        .into_iter()
        .map(|e| e.id)
        .collect();
    if !missing.is_empty() {
        return ConvergenceResult::Behind { missing };
    }

    let extra: Vec<DocumentId> = cache
        .entries
        .iter()
        .filter(|e| !manifest.contains(&e.id))
        .map(|e| e.id)
        .collect();
    if !extra.is_empty() {
        return ConvergenceResult::Ahead { extra };
    }

    ConvergenceResult::Converged
}

/// Deterministic hash of what a cache holds.
///
/// Algorithm:
/// 1. Collect `(id, address)` for every addressed entry, sorted by id
/// 2. Hash: Blake3(domain || owner || id_1 || address_1 || ...)
pub fn cache_state_hash(cache: &LocalCache) -> Blake3Hash {
    state_hash(&cache.owner, &cache.entries)
}

/// The same hash over a manifest's entries.
pub fn manifest_state_hash(manifest: &Manifest) -> Blake3Hash {
    state_hash(&manifest.owner_pubkey, &manifest.entries)
}

fn state_hash(owner: &Ed25519PublicKey, entries: &[ManifestEntry]) -> Blake3Hash {
    let mut pairs: Vec<_> = entries
        .iter()
        .filter_map(|e| e.address.as_ref().map(|a| (e.id, a.as_str())))
        .collect();
    pairs.sort();

    let mut hasher = blake3::Hasher::new();
    hasher.update(STATE_DOMAIN);
    hasher.update(owner.as_bytes());
    for (id, address) in pairs {
        hasher.update(id.as_bytes());
        // Length prefix keeps adjacent addresses unambiguous.
        hasher.update(&(address.len() as u64).to_le_bytes());
        hasher.update(address.as_bytes());
    }
    Blake3Hash::from_bytes(*hasher.finalize().as_bytes())
}

/// Verify the stored cache for `manifest.owner_pubkey` against `manifest`.
pub async fn verify_peer_convergence<L: LocalStore + ?Sized>(
    local: &L,
    manifest: &Manifest,
) -> Result<ConvergenceResult> {
    let cache = local
        .get_cache(&manifest.owner_pubkey)
        .await?
        .unwrap_or_else(|| LocalCache::new(manifest.owner_pubkey));
    Ok(verify_cache_convergence(&cache, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filux_core::{ContentAddress, EntryKind, Keypair};
    use filux_store::MemoryStore;
    use proptest::prelude::*;

    fn owner() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    fn id(n: u8) -> DocumentId {
        DocumentId::from_bytes([n; 16])
    }

    fn manifest_with(ids: &[u8]) -> Manifest {
        let mut manifest = Manifest::new(owner().public_key());
        for &n in ids {
            manifest.record(
                id(n),
                ContentAddress::new(format!("addr-{n}")),
                EntryKind::Post,
                n as i64,
            );
        }
        manifest
    }

    fn cache_holding(manifest: &Manifest) -> LocalCache {
        let mut cache = LocalCache::new(manifest.owner_pubkey);
        for entry in &manifest.entries {
            cache.hold(entry.clone());
        }
        cache
    }

    #[test]
    fn test_converged() {
        let manifest = manifest_with(&[1, 2, 3]);
        let cache = cache_holding(&manifest);

        assert!(verify_cache_convergence(&cache, &manifest).is_converged());
        assert_eq!(cache_state_hash(&cache), manifest_state_hash(&manifest));
    }

    #[test]
    fn test_behind() {
        let manifest = manifest_with(&[1, 2, 3]);
        let cache = cache_holding(&manifest_with(&[1]));

        assert_eq!(
            verify_cache_convergence(&cache, &manifest),
            ConvergenceResult::Behind {
                missing: vec![id(2), id(3)]
            }
        );
        assert_ne!(cache_state_hash(&cache), manifest_state_hash(&manifest));
    }

    #[test]
    fn test_ahead() {
        let manifest = manifest_with(&[1]);
        let cache = cache_holding(&manifest_with(&[1, 2]));

        assert_eq!(
            verify_cache_convergence(&cache, &manifest),
            ConvergenceResult::Ahead { extra: vec![id(2)] }
        );
    }

    #[test]
    fn test_stale_address_is_behind() {
        let mut manifest = manifest_with(&[1]);
        let cache = cache_holding(&manifest);
        manifest.record(id(1), ContentAddress::new("moved"), EntryKind::Post, 1);

        assert!(matches!(
            verify_cache_convergence(&cache, &manifest),
            ConvergenceResult::Behind { .. }
        ));
    }

    #[tokio::test]
    async fn test_peer_without_cache_is_behind() {
        let store = MemoryStore::new();
        let manifest = manifest_with(&[1]);

        let result = verify_peer_convergence(&store, &manifest).await.unwrap();
        assert!(!result.is_converged());

        store.put_cache(&cache_holding(&manifest)).await.unwrap();
        let result = verify_peer_convergence(&store, &manifest).await.unwrap();
        assert!(result.is_converged());
    }

    proptest! {
        #[test]
        fn state_hash_ignores_hold_order(mut ids in prop::collection::btree_set(any::<u8>(), 0..16)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>()))
        {
            let manifest = manifest_with(&ids);
            ids.reverse();
            let reversed = cache_holding(&manifest_with(&ids));

            prop_assert_eq!(cache_state_hash(&reversed), manifest_state_hash(&manifest));
        }
    }
}
