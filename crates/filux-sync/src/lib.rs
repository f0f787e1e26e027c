//! # Filux Sync
//!
//! Publishing an identity's records and pulling followed identities.
//!
//! ## Overview
//!
//! Two batch operations move data between the local store and a shared
//! content store:
//!
//! - [`Publisher::publish_local_changes`] pushes whatever changed since the
//!   last publish, re-signs the manifest and updates the identity's pointer.
//! - [`FollowSyncEngine::sync_followed`] resolves each followed identity's
//!   pointer and fetches only the entries the local cache lacks.
//!
//! ## Key Properties
//!
//! - **Incremental**: Unchanged records are never pushed or fetched twice
//! - **Verified**: Nothing enters a cache without a valid signature
//! - **Partial**: One failed record or peer never aborts the batch
//! - **Resumable**: Transient failures are retried on the next call
//!
//! ## Flow
//!
//! ```text
//! Publisher                    ContentStore                 Follower
//!   |-- add(record) ------------->|                            |
//!   |-- add(manifest) ----------->|                            |
//!   |-- publish(pointer) -------->|                            |
//!   |                             |<------- resolve(pointer) --|
//!   |                             |<------- get(manifest) -----|
//!   |                             |<------- get(missing) ------|
//! ```

pub mod convergence;
pub mod error;
pub mod fallback;
pub mod follow;
pub mod propagation;
pub mod publish;
pub mod report;

pub use convergence::{
    cache_state_hash, manifest_state_hash, verify_cache_convergence, verify_peer_convergence,
    ConvergenceResult,
};
pub use error::{ItemError, Result, SyncError};
pub use fallback::FallbackStore;
pub use follow::{FollowSyncConfig, FollowSyncEngine, SyncFollowedOptions};
pub use propagation::wait_for_pointer;
pub use publish::{PublishConfig, PublishOptions, Publisher};
pub use report::{
    EntryFailure, FailedItem, PeerOutcome, PeerStatus, Propagation, PublishReport, PublishStatus,
    PublishedItem, SyncFollowedReport,
};
