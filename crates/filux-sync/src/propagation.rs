//! Waiting for a pointer update to become observable.

use std::time::Duration;

use filux_core::{ContentAddress, PointerName};
use filux_store::ContentStore;

/// Poll `pointer` until it resolves to `expected` or `timeout` elapses.
///
/// Returns whether the update was observed. Resolve errors count as "not
/// yet" and are retried at the next poll.
pub async fn wait_for_pointer<C: ContentStore + ?Sized>(
    content: &C,
    pointer: &PointerName,
    expected: &ContentAddress,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let poll = async {
        loop {
            match content.resolve(pointer).await {
                Ok(Some(address)) if &address == expected => return,
                Ok(_) => {}
                Err(e) => tracing::debug!(pointer = %pointer, error = %e, "resolve failed while waiting"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, poll).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filux_store::MemoryContentStore;

    const POLL: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_confirms_visible_pointer() {
        let store = MemoryContentStore::new();
        let pointer = PointerName::new("k51a");
        let address = ContentAddress::mock_for(b"m1");
        store.publish(&pointer, &address).await.unwrap();

        assert!(wait_for_pointer(&store, &pointer, &address, Duration::from_secs(1), POLL).await);
    }

    #[tokio::test]
    async fn test_times_out_on_held_pointer() {
        let store = MemoryContentStore::new();
        store.hold_pointers();
        let pointer = PointerName::new("k51a");
        let address = ContentAddress::mock_for(b"m1");
        store.publish(&pointer, &address).await.unwrap();

        assert!(!wait_for_pointer(&store, &pointer, &address, Duration::from_millis(30), POLL).await);
    }
}
