//! Read-side views assembled from own documents and peer caches.

use std::collections::{BTreeMap, BTreeSet};

use filux_core::collision::{detect_all, disambiguate};
use filux_core::{Document, Ed25519PublicKey, Manifest, ThreadManifest};

/// One document as it appears in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub document: Document,
    /// Author name as rendered, with a key suffix when it collides.
    pub display_name: String,
    /// Whether the document passed verification. Always true unless
    /// unverified documents were requested.
    pub verified: bool,
    /// Authored by the local identity.
    pub own: bool,
}

/// A thread with its posts ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    pub manifest: ThreadManifest,
    pub documents: Vec<Document>,
}

/// Target of a resolved link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Document(Document),
    /// A pointer resolves to the identity's latest manifest.
    Manifest(Manifest),
}

/// Renders author names, suffixing any name shared by distinct keys.
pub(crate) struct NameBook {
    names: BTreeMap<Ed25519PublicKey, String>,
    colliding: BTreeSet<Ed25519PublicKey>,
}

impl NameBook {
    pub(crate) fn new(names: BTreeMap<Ed25519PublicKey, String>) -> Self {
        let colliding = detect_all(names.iter().map(|(k, n)| (n.as_str(), k)))
            .into_iter()
            .flat_map(|c| c.pubkeys)
            .collect();
        Self { names, colliding }
    }

    pub(crate) fn render(&self, doc: &Document) -> String {
        let name = self
            .names
            .get(&doc.pubkey)
            .map(String::as_str)
            .unwrap_or(doc.author.as_str());
        if self.colliding.contains(&doc.pubkey) {
            disambiguate(name, &doc.pubkey)
        } else {
            name.to_string()
        }
    }
}

/// Newest first; ties broken by id so the order is stable.
pub(crate) fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| {
        b.document
            .timestamp
            .cmp(&a.document.timestamp)
            .then_with(|| b.document.id.cmp(&a.document.id))
    });
}
