//! # Filux Testkit
//!
//! Testing utilities for filux.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed inputs whose document ids and signing bytes
//!   every implementation must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: identities with their own stores, optionally sharing one
//!   network
//! - **Fault injection**: a content store wrapper that fails on demand
//!
//! ## Golden Vectors
//!
//! ```rust
//! use filux_testkit::vectors::{all_vectors, document_from_vector};
//!
//! for vector in all_vectors() {
//!     let doc = document_from_vector(&vector);
//!     println!("{}: {}", vector.name, doc.id.to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use filux_testkit::generators::{document_from_params, DocumentParams};
//!
//! proptest! {
//!     #[test]
//!     fn id_is_deterministic(params: DocumentParams) {
//!         let d1 = document_from_params(&params);
//!         let d2 = document_from_params(&params);
//!         prop_assert_eq!(d1.id, d2.id);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use filux_testkit::fixtures::{multi_party_fixtures, BASE_TIMESTAMP};
//!
//! let parties = multi_party_fixtures(2);
//! let root = parties[0].make_thread_root(BASE_TIMESTAMP, "Topic");
//! let reply = parties[1].make_reply(BASE_TIMESTAMP + 1, &root, "hi");
//! assert_eq!(reply.thread_id, Some(root.id));
//! ```

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use faulty::FlakyContentStore;
pub use fixtures::{multi_party_fixtures, TestFixture, BASE_TIMESTAMP};
pub use generators::{document_from_params, DocumentParams};
pub use vectors::{all_vectors, document_from_vector, verify_all_vectors, GoldenVector};
