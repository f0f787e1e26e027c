//! Thread manifests and their reconciliation.
//!
//! A thread is identified by its root post's id. Nobody owns a thread once
//! it exists: every participant may hold and republish a copy, and copies
//! are merged with [`ThreadManifest::merge`]. The participant set only ever
//! grows.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::crypto::Ed25519PublicKey;
use crate::document::Document;
use crate::error::CoreError;
use crate::id::thread_manifest_id;
use crate::types::{ContentAddress, DocumentId};
use crate::version::ManifestVersion;

/// Longest thread title kept, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Shared metadata of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadManifest {
    /// Id of the thread-starting post.
    pub thread_id: DocumentId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub participants: BTreeSet<Ed25519PublicKey>,
    /// Where the root post was published, once known.
    #[serde(default)]
    pub root_address: Option<ContentAddress>,
    /// Bumped on every effective change by whoever holds this copy.
    pub version: ManifestVersion,
}

impl ThreadManifest {
    /// An empty manifest for `thread_id`.
    pub fn new(thread_id: DocumentId) -> Self {
        Self {
            thread_id,
            title: String::new(),
            description: String::new(),
            participants: BTreeSet::new(),
            root_address: None,
            version: ManifestVersion::ZERO,
        }
    }

    /// Stable manifest entry id of this thread manifest.
    pub fn id(&self) -> DocumentId {
        thread_manifest_id(&self.thread_id)
    }

    /// Fold one observed document into the thread.
    ///
    /// Documents of other threads are ignored. Returns whether anything
    /// changed; the version is bumped when it did.
    pub fn apply(&mut self, doc: &Document) -> bool {
        if doc.thread() != Some(self.thread_id) {
            return false;
        }

        let before = self.participants.len();
        self.participants.insert(doc.pubkey);
        self.participants.extend(doc.participants.iter().copied());
        let mut changed = self.participants.len() != before;

        if doc.is_thread_root() && doc.id == self.thread_id {
            let (title, description) = split_title(&doc.content);
            if self.title != title || self.description != description {
                self.title = title;
                self.description = description;
                changed = true;
            }
        }

        if changed {
            self.version.bump();
        }
        changed
    }

    /// Record where the root post lives. Returns whether it changed.
    pub fn set_root_address(&mut self, address: ContentAddress) -> bool {
        if self.root_address.as_ref() == Some(&address) {
            return false;
        }
        self.root_address = Some(address);
        self.version.bump();
        true
    }

    /// Merge two copies of the same thread.
    ///
    /// Participants are unioned. Textual fields come from the copy with the
    /// strictly higher version; equal versions prefer more participants,
    /// then the greater `(title, description)` so the result does not
    /// depend on argument order. Returns `None` for different threads.
    pub fn merge(&self, other: &ThreadManifest) -> Option<ThreadManifest> {
        if self.thread_id != other.thread_id {
            return None;
        }

        let (winner, loser) = match self.precedence(other) {
            Ordering::Less => (other, self),
            _ => (self, other),
        };

        Some(ThreadManifest {
            thread_id: self.thread_id,
            title: winner.title.clone(),
            description: winner.description.clone(),
            participants: self.participants.union(&other.participants).copied().collect(),
            root_address: winner
                .root_address
                .clone()
                .or_else(|| loser.root_address.clone()),
            version: winner.version.max(loser.version),
        })
    }

    fn precedence(&self, other: &ThreadManifest) -> Ordering {
        self.version
            .cmp(&other.version)
            .then(self.participants.len().cmp(&other.participants.len()))
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.description.cmp(&other.description))
            .then_with(|| self.root_address.cmp(&other.root_address))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// Build a thread manifest from a single document.
pub fn reconcile(thread_id: DocumentId, doc: &Document) -> ThreadManifest {
    let mut thread = ThreadManifest::new(thread_id);
    thread.apply(doc);
    thread
}

/// First line is the title, the remainder the description.
fn split_title(content: &str) -> (String, String) {
    let content = content.trim();
    let (first, rest) = content.split_once('\n').unwrap_or((content, ""));
    let title: String = first.trim().chars().take(MAX_TITLE_LEN).collect();
    (title, rest.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::document::{DocumentBuilder, DocumentKind};

    struct Thread {
        a: Keypair,
        b: Keypair,
        root: Document,
        reply: Document,
    }

    fn thread() -> Thread {
        let a = Keypair::from_seed(&[0xaa; 32]);
        let b = Keypair::from_seed(&[0xbb; 32]);
        let root = DocumentBuilder::new(a.public_key(), "alice")
            .kind(DocumentKind::ThreadRoot)
            .timestamp(1)
            .content("Rust in 2026\nWhat are you building?")
            .sign(&a);
        let reply = DocumentBuilder::new(b.public_key(), "bob")
            .timestamp(2)
            .content("A sync engine")
            .reply_to(root.id)
            .thread(root.id)
            .participants([a.public_key()])
            .sign(&b);
        Thread { a, b, root, reply }
    }

    #[test]
    fn test_root_sets_title_and_description() {
        let t = thread();
        let manifest = reconcile(t.root.id, &t.root);
        assert_eq!(manifest.title, "Rust in 2026");
        assert_eq!(manifest.description, "What are you building?");
        assert_eq!(manifest.participants, BTreeSet::from([t.a.public_key()]));
        assert_eq!(manifest.id(), thread_manifest_id(&t.root.id));
    }

    #[test]
    fn test_participants_independent_of_order() {
        let t = thread();
        let expected = BTreeSet::from([t.a.public_key(), t.b.public_key()]);

        let mut root_first = ThreadManifest::new(t.root.id);
        root_first.apply(&t.root);
        root_first.apply(&t.reply);

        let mut reply_first = ThreadManifest::new(t.root.id);
        reply_first.apply(&t.reply);
        reply_first.apply(&t.root);

        assert_eq!(root_first.participants, expected);
        assert_eq!(reply_first.participants, expected);
        assert_eq!(root_first.title, reply_first.title);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let t = thread();
        let mut m = reconcile(t.root.id, &t.root);
        assert!(m.apply(&t.reply));
        let version = m.version;
        assert!(!m.apply(&t.reply));
        assert!(!m.apply(&t.root));
        assert_eq!(m.version, version);
    }

    #[test]
    fn test_foreign_thread_ignored() {
        let t = thread();
        let other = DocumentBuilder::new(t.b.public_key(), "bob")
            .content("unrelated")
            .sign(&t.b);
        let mut m = ThreadManifest::new(t.root.id);
        assert!(!m.apply(&other));
        assert!(m.participants.is_empty());
    }

    #[test]
    fn test_merge_unions_participants() {
        let t = thread();
        let c = Keypair::from_seed(&[0xcc; 32]).public_key();

        let mut held_by_a = reconcile(t.root.id, &t.root);
        held_by_a.participants.insert(c);
        let held_by_b = reconcile(t.root.id, &t.reply);

        let merged = held_by_a.merge(&held_by_b).unwrap();
        assert_eq!(
            merged.participants,
            BTreeSet::from([t.a.public_key(), t.b.public_key(), c])
        );
        assert_eq!(merged, held_by_b.merge(&held_by_a).unwrap());
    }

    #[test]
    fn test_merge_prefers_strictly_higher_version() {
        let t = thread();
        let mut newer = reconcile(t.root.id, &t.root);
        newer.title = "Renamed".into();
        newer.version = ManifestVersion::new(0, 0, 0, 9);

        let mut older = ThreadManifest::new(t.root.id);
        older.title = "Old".into();
        older.participants = BTreeSet::from([t.a.public_key(), t.b.public_key()]);
        older.version = ManifestVersion::new(0, 0, 0, 3);

        let merged = older.merge(&newer).unwrap();
        assert_eq!(merged.title, "Renamed");
        assert_eq!(merged.version, newer.version);
        assert_eq!(merged.participants.len(), 2);
    }

    #[test]
    fn test_merge_tie_prefers_more_participants() {
        let t = thread();
        let mut few = ThreadManifest::new(t.root.id);
        few.title = "few".into();
        few.participants.insert(t.a.public_key());
        few.version = ManifestVersion::new(0, 0, 0, 5);

        let mut many = few.clone();
        many.title = "many".into();
        many.participants.insert(t.b.public_key());

        assert_eq!(few.merge(&many).unwrap().title, "many");
        assert_eq!(many.merge(&few).unwrap().title, "many");
    }

    #[test]
    fn test_merge_keeps_known_root_address() {
        let t = thread();
        let mut with_address = ThreadManifest::new(t.root.id);
        with_address.set_root_address(ContentAddress::mock_for(b"root"));

        let mut higher = ThreadManifest::new(t.root.id);
        higher.version = ManifestVersion::new(1, 0, 0, 0);

        let merged = higher.merge(&with_address).unwrap();
        assert_eq!(merged.root_address, Some(ContentAddress::mock_for(b"root")));
    }

    #[test]
    fn test_merge_rejects_other_thread() {
        let a = ThreadManifest::new(DocumentId::from_bytes([1; 16]));
        let b = ThreadManifest::new(DocumentId::from_bytes([2; 16]));
        assert!(a.merge(&b).is_none());
    }

    #[test]
    fn test_json_shape() {
        let t = thread();
        let m = reconcile(t.root.id, &t.root);
        let value: serde_json::Value = serde_json::from_slice(&m.to_json().unwrap()).unwrap();
        for field in ["thread_id", "title", "description", "participants", "root_address", "version"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert!(value["participants"].is_array());
    }
}
