//! Proptest generators for property-based testing.

use proptest::prelude::*;

use filux_core::{
    ContentAddress, Document, DocumentBuilder, DocumentId, DocumentKind, Ed25519PublicKey,
    EntryKind, Keypair, Manifest, ManifestVersion,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Ed25519PublicKey.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a random DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    any::<[u8; 16]>().prop_map(DocumentId::from_bytes)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_000_000_000_000i64
}

/// Generate post content.
pub fn content(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..=max_len).prop_map(|cs| cs.into_iter().collect())
}

/// Generate a valid display name.
pub fn display_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate a version within the component bounds.
pub fn manifest_version() -> impl Strategy<Value = ManifestVersion> {
    (0u16..=9999, 0u16..=9999, 0u16..=9999, 0u16..=9999)
        .prop_map(|(a, b, c, d)| ManifestVersion::new(a, b, c, d))
}

/// Generate a manifest of addressed post entries. Unsigned.
pub fn manifest(owner: Ed25519PublicKey, max_entries: usize) -> impl Strategy<Value = Manifest> {
    prop::collection::btree_set(any::<[u8; 16]>(), 0..=max_entries).prop_map(move |ids| {
        let mut manifest = Manifest::new(owner);
        for (i, id) in ids.into_iter().enumerate() {
            manifest.record(
                DocumentId::from_bytes(id),
                ContentAddress::mock_for(&id),
                EntryKind::Post,
                i as i64,
            );
        }
        manifest
    })
}

/// Parameters for generating a post.
#[derive(Debug, Clone)]
pub struct DocumentParams {
    pub keypair: Keypair,
    pub author: String,
    pub timestamp: i64,
    pub content: String,
    pub thread_id: Option<DocumentId>,
}

impl Arbitrary for DocumentParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(), // seed
            display_name(),
            timestamp(),
            content(200),
            any::<Option<[u8; 16]>>(),
        )
            .prop_map(|(seed, author, timestamp, content, thread)| DocumentParams {
                keypair: Keypair::from_seed(&seed),
                author,
                timestamp,
                content,
                thread_id: thread.map(DocumentId::from_bytes),
            })
            .boxed()
    }
}

/// Generate a signed post from parameters.
pub fn document_from_params(params: &DocumentParams) -> Document {
    let mut builder = DocumentBuilder::new(params.keypair.public_key(), &params.author)
        .kind(DocumentKind::Post)
        .timestamp(params.timestamp)
        .content(params.content.clone());

    if let Some(thread_id) = params.thread_id {
        builder = builder.thread(thread_id);
    }

    builder.sign(&params.keypair)
}
