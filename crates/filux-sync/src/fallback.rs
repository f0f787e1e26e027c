//! Degradation to a local-only address space.
//!
//! [`FallbackStore`] forwards to a primary content store until it reports
//! [`StoreError::Unavailable`]; from then on every call goes to the
//! local-only store. Addresses keep flowing through the pipeline but peers
//! cannot fetch them, which the store reports via `is_local_only`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use filux_core::{ContentAddress, PointerName};
use filux_store::{ContentStore, Result, StoreError};

/// A content store that degrades to a local-only one.
pub struct FallbackStore<P, M> {
    primary: P,
    fallback: M,
    degraded: AtomicBool,
}

impl<P: ContentStore, M: ContentStore> FallbackStore<P, M> {
    pub fn new(primary: P, fallback: M) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether calls are currently served by the fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Try the primary again on the next call.
    pub fn reset(&self) {
        self.degraded.store(false, Ordering::SeqCst);
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &M {
        &self.fallback
    }

    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                reason,
                "content store unavailable, using local-only addresses"
            );
        }
    }
}

#[async_trait]
impl<P: ContentStore, M: ContentStore> ContentStore for FallbackStore<P, M> {
    async fn add(&self, bytes: Bytes) -> Result<ContentAddress> {
        if !self.is_degraded() {
            match self.primary.add(bytes.clone()).await {
                Err(StoreError::Unavailable(reason)) => self.degrade(&reason),
                other => return other,
            }
        }
        self.fallback.add(bytes).await
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Bytes>> {
        if !self.is_degraded() {
            match self.primary.get(address).await {
                Err(StoreError::Unavailable(reason)) => self.degrade(&reason),
                other => return other,
            }
        }
        self.fallback.get(address).await
    }

    async fn publish(&self, pointer: &PointerName, address: &ContentAddress) -> Result<()> {
        if !self.is_degraded() {
            match self.primary.publish(pointer, address).await {
                Err(StoreError::Unavailable(reason)) => self.degrade(&reason),
                other => return other,
            }
        }
        self.fallback.publish(pointer, address).await
    }

    async fn resolve(&self, pointer: &PointerName) -> Result<Option<ContentAddress>> {
        if !self.is_degraded() {
            match self.primary.resolve(pointer).await {
                Err(StoreError::Unavailable(reason)) => self.degrade(&reason),
                other => return other,
            }
        }
        self.fallback.resolve(pointer).await
    }

    fn is_local_only(&self) -> bool {
        self.is_degraded() || self.primary.is_local_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filux_store::MemoryContentStore;

    #[tokio::test]
    async fn test_forwards_while_primary_is_up() {
        let store = FallbackStore::new(MemoryContentStore::new(), MemoryContentStore::local_only());
        let address = store.add(Bytes::from_static(b"doc")).await.unwrap();

        assert!(!store.is_local_only());
        assert!(store.primary().contains(&address));
        assert!(store.fallback().is_empty());
    }

    #[tokio::test]
    async fn test_degrades_on_unavailable() {
        let store = FallbackStore::new(MemoryContentStore::new(), MemoryContentStore::local_only());
        store.primary().set_available(false);

        let address = store.add(Bytes::from_static(b"doc")).await.unwrap();
        assert!(address.is_mock());
        assert!(store.is_degraded());
        assert!(store.is_local_only());
        assert!(store.fallback().contains(&address));

        // Stays degraded even after the primary recovers.
        store.primary().set_available(true);
        let pointer = PointerName::new("k51me");
        store.publish(&pointer, &address).await.unwrap();
        assert_eq!(store.resolve(&pointer).await.unwrap(), Some(address.clone()));
        assert!(store.primary().resolve(&pointer).await.unwrap().is_none());

        store.reset();
        assert!(!store.is_local_only());
    }

    #[tokio::test]
    async fn test_other_errors_are_not_masked() {
        let store = FallbackStore::new(MemoryContentStore::new(), MemoryContentStore::local_only());
        let address = store.add(Bytes::from_static(b"doc")).await.unwrap();
        store.primary().fail_address(&address);

        assert!(matches!(store.get(&address).await, Err(StoreError::Io(_))));
        assert!(!store.is_degraded());
    }
}
