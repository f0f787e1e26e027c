//! A content store wrapper that fails on demand.
//!
//! Failures are I/O timeouts: transient, and not the "store down" signal
//! that makes a fallback store switch address spaces.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use filux_core::{ContentAddress, PointerName};
use filux_store::{ContentStore, Result, StoreError};

/// Wraps a content store and fails the next `n` calls of a kind.
pub struct FlakyContentStore<C> {
    inner: C,
    failing_adds: AtomicUsize,
    failing_gets: AtomicUsize,
    failing_publishes: AtomicUsize,
    injected: AtomicUsize,
}

impl<C: ContentStore> FlakyContentStore<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            failing_adds: AtomicUsize::new(0),
            failing_gets: AtomicUsize::new(0),
            failing_publishes: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Fail the next `n` adds.
    pub fn fail_adds(&self, n: usize) {
        self.failing_adds.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` gets.
    pub fn fail_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` pointer updates.
    pub fn fail_publishes(&self, n: usize) {
        self.failing_publishes.store(n, Ordering::SeqCst);
    }

    /// Failures injected so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn trip(&self, counter: &AtomicUsize, op: &str) -> Result<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("injected {} failure", op),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<C: ContentStore> ContentStore for FlakyContentStore<C> {
    async fn add(&self, bytes: Bytes) -> Result<ContentAddress> {
        self.trip(&self.failing_adds, "add")?;
        self.inner.add(bytes).await
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Bytes>> {
        self.trip(&self.failing_gets, "get")?;
        self.inner.get(address).await
    }

    async fn publish(&self, pointer: &PointerName, address: &ContentAddress) -> Result<()> {
        self.trip(&self.failing_publishes, "publish")?;
        self.inner.publish(pointer, address).await
    }

    async fn resolve(&self, pointer: &PointerName) -> Result<Option<ContentAddress>> {
        self.inner.resolve(pointer).await
    }

    fn is_local_only(&self) -> bool {
        self.inner.is_local_only()
    }
}
