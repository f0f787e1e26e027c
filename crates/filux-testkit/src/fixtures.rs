//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use filux::{Node, NodeConfig};
use filux_core::{Document, DocumentBuilder, DocumentId, DocumentKind, Ed25519PublicKey, Identity, Keypair};
use filux_store::{MemoryContentStore, MemoryStore};

/// Default timestamp of fixture documents: 2026-01-14T12:00:00Z.
pub const BASE_TIMESTAMP: i64 = 1_736_870_400_000;

/// An identity with its own local store, publishing to a content store
/// that may be shared with other fixtures.
pub struct TestFixture {
    pub identity: Identity,
    pub local: Arc<MemoryStore>,
    pub content: Arc<MemoryContentStore>,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair and a private network.
    pub fn new(display_name: &str) -> Self {
        Self::on(Keypair::generate(), display_name, Arc::new(MemoryContentStore::new()))
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32], display_name: &str) -> Self {
        Self::on(
            Keypair::from_seed(&seed),
            display_name,
            Arc::new(MemoryContentStore::new()),
        )
    }

    fn on(keypair: Keypair, display_name: &str, content: Arc<MemoryContentStore>) -> Self {
        let identity = match Identity::new(keypair.clone(), display_name) {
            Ok(identity) => identity,
            Err(_) => panic!("fixture display name {:?} is invalid", display_name),
        };
        Self {
            identity,
            local: Arc::new(MemoryStore::new()),
            content,
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.identity.pubkey()
    }

    fn builder(&self, timestamp: i64) -> DocumentBuilder {
        DocumentBuilder::new(self.identity.pubkey(), self.identity.display_name())
            .timestamp(timestamp)
    }

    /// A signed post. Not stored.
    pub fn make_post(&self, timestamp: i64, content: &str) -> Document {
        self.builder(timestamp)
            .content(content)
            .sign(self.identity.keypair())
    }

    /// A signed thread root. Not stored.
    pub fn make_thread_root(&self, timestamp: i64, title: &str) -> Document {
        self.builder(timestamp)
            .kind(DocumentKind::ThreadRoot)
            .content(title)
            .sign(self.identity.keypair())
    }

    /// A signed reply inheriting `parent`'s thread and participants.
    pub fn make_reply(&self, timestamp: i64, parent: &Document, content: &str) -> Document {
        let thread_id: DocumentId = parent.thread().unwrap_or(parent.id);
        self.builder(timestamp)
            .content(content)
            .reply_to(parent.id)
            .thread(thread_id)
            .participants(parent.participants.iter().copied())
            .participants([parent.pubkey])
            .sign(self.identity.keypair())
    }

    /// A node over this fixture's stores and identity.
    pub async fn node(&self) -> filux::Result<Node<MemoryStore, MemoryContentStore>> {
        Node::init_with_keypair(
            Arc::clone(&self.local),
            Arc::clone(&self.content),
            self.identity.keypair().clone(),
            self.identity.display_name(),
            NodeConfig::default(),
        )
        .await
    }
}

/// Create multiple fixtures sharing one content store.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    let network = Arc::new(MemoryContentStore::new());
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::on(
                Keypair::from_seed(&seed),
                &format!("party-{}", i),
                Arc::clone(&network),
            )
        })
        .collect()
}
