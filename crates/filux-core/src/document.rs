//! Documents: the signed posts, reactions, reposts and thread roots.
//!
//! A document is created once by its author, signed once and never edited.
//! Copies held by other peers are byte-identical.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::canonical::document_signing_bytes;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::id::derive_id;
use crate::types::DocumentId;

/// Maximum content size in bytes.
pub const MAX_CONTENT_LEN: usize = 64 * 1024;

/// Maximum number of participants recorded on one document.
pub const MAX_PARTICIPANTS: usize = 256;

/// Content type used when the author does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// What a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A free-standing or reply post.
    Post,
    /// A reaction to `reply_to` (vote, emoji, rating).
    Reaction,
    /// A repost of `reply_to`, optionally with a comment.
    Repost,
    /// The post that opens a thread; its id is the thread id.
    ThreadRoot,
}

impl DocumentKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Reaction => "reaction",
            Self::Repost => "repost",
            Self::ThreadRoot => "thread_root",
        }
    }

    /// Whether this kind must reference another document.
    pub fn requires_reply_to(self) -> bool {
        matches!(self, Self::Reaction | Self::Repost)
    }
}

/// A signed document.
///
/// Serializes to the wire JSON shape shared by all peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// `derive_id(pubkey, timestamp, content)`.
    pub id: DocumentId,

    /// The author.
    pub pubkey: Ed25519PublicKey,

    /// Author's display name at creation time. Advisory only.
    pub author: String,

    /// Author-claimed creation time (Unix milliseconds). Untrusted.
    pub timestamp: i64,

    /// The payload.
    pub content: String,

    /// Declared MIME category of `content`.
    pub content_type: String,

    pub kind: DocumentKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<DocumentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<DocumentId>,

    /// Pubkeys known to be in the thread when this document was created.
    #[serde(default)]
    pub participants: BTreeSet<Ed25519PublicKey>,

    /// Ed25519 signature over the canonical encoding of all other fields.
    pub signature: Ed25519Signature,
}

impl Document {
    /// The thread this document belongs to, if any.
    ///
    /// A thread root belongs to its own thread.
    pub fn thread(&self) -> Option<DocumentId> {
        match (self.kind, self.thread_id) {
            (_, Some(thread_id)) => Some(thread_id),
            (DocumentKind::ThreadRoot, None) => Some(self.id),
            _ => None,
        }
    }

    /// Whether this document opens a thread.
    pub fn is_thread_root(&self) -> bool {
        self.kind == DocumentKind::ThreadRoot
    }

    /// Serialize to the wire JSON form.
    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Parse from the wire JSON form. Does not verify.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// Builder for creating documents.
pub struct DocumentBuilder {
    pubkey: Ed25519PublicKey,
    author: String,
    timestamp: i64,
    content: String,
    content_type: String,
    kind: DocumentKind,
    reply_to: Option<DocumentId>,
    thread_id: Option<DocumentId>,
    participants: BTreeSet<Ed25519PublicKey>,
}

impl DocumentBuilder {
    /// Start building a post by `pubkey`, shown as `author`.
    pub fn new(pubkey: Ed25519PublicKey, author: impl Into<String>) -> Self {
        Self {
            pubkey,
            author: author.into(),
            timestamp: 0,
            content: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            kind: DocumentKind::Post,
            reply_to: None,
            thread_id: None,
            participants: BTreeSet::new(),
        }
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Set the content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the kind.
    pub fn kind(mut self, kind: DocumentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Reference a parent document.
    pub fn reply_to(mut self, parent: DocumentId) -> Self {
        self.reply_to = Some(parent);
        self
    }

    /// Place the document in a thread.
    pub fn thread(mut self, thread_id: DocumentId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Add known thread participants.
    pub fn participants(mut self, pubkeys: impl IntoIterator<Item = Ed25519PublicKey>) -> Self {
        self.participants.extend(pubkeys);
        self
    }

    /// Derive the id, then sign. The author always participates.
    pub fn sign(mut self, keypair: &Keypair) -> Document {
        self.participants.insert(self.pubkey);
        let id = derive_id(&self.pubkey, self.timestamp, &self.content);

        let mut doc = Document {
            id,
            pubkey: self.pubkey,
            author: self.author,
            timestamp: self.timestamp,
            content: self.content,
            content_type: self.content_type,
            kind: self.kind,
            reply_to: self.reply_to,
            thread_id: self.thread_id,
            participants: self.participants,
            signature: Ed25519Signature::ZERO,
        };
        doc.signature = keypair.sign(&document_signing_bytes(&doc));
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    #[test]
    fn test_builder_derives_id_and_adds_author() {
        let kp = keypair();
        let doc = DocumentBuilder::new(kp.public_key(), "alice")
            .timestamp(1_736_870_400_000)
            .content("hello")
            .sign(&kp);

        assert_eq!(doc.id, derive_id(&kp.public_key(), 1_736_870_400_000, "hello"));
        assert!(doc.participants.contains(&kp.public_key()));
        assert_eq!(doc.kind, DocumentKind::Post);
        assert_eq!(doc.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let kp = keypair();
        let build = || {
            DocumentBuilder::new(kp.public_key(), "alice")
                .timestamp(7)
                .content("same")
                .sign(&kp)
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_thread_of_root_is_itself() {
        let kp = keypair();
        let root = DocumentBuilder::new(kp.public_key(), "alice")
            .kind(DocumentKind::ThreadRoot)
            .content("Topic")
            .sign(&kp);
        assert_eq!(root.thread(), Some(root.id));

        let plain = DocumentBuilder::new(kp.public_key(), "alice")
            .content("no thread")
            .sign(&kp);
        assert_eq!(plain.thread(), None);
    }

    #[test]
    fn test_wire_shape() {
        let kp = keypair();
        let doc = DocumentBuilder::new(kp.public_key(), "alice")
            .timestamp(1)
            .content("hi")
            .sign(&kp);
        let value: serde_json::Value = serde_json::from_slice(&doc.to_json().unwrap()).unwrap();

        for field in [
            "id",
            "pubkey",
            "author",
            "timestamp",
            "content",
            "content_type",
            "kind",
            "participants",
            "signature",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["kind"], "post");
        assert_eq!(value["id"].as_str().unwrap().len(), 32);
        assert!(value.get("reply_to").is_none());

        let back = Document::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back, doc);
    }
}
