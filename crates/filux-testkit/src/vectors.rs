//! Golden test vectors for deterministic verification.
//!
//! Every peer must derive identical document ids and signing bytes from the
//! same inputs, or manifests would list ids nobody else can check.

use serde::Serialize;

use filux_core::{document_signing_bytes, Document, DocumentBuilder, DocumentKind, Keypair};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub author: &'static str,
    pub timestamp: i64,
    pub content: &'static str,
    pub kind: DocumentKind,
    /// Expected document id (hex). Empty until pinned.
    pub expected_id: &'static str,
}

/// Derived outputs of a vector, for export to other implementations.
#[derive(Debug, Clone, Serialize)]
pub struct VectorOutput {
    pub name: String,
    pub seed: String,
    pub pubkey: String,
    pub id: String,
    pub signing_bytes: String,
    pub signature: String,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "post with hello content",
            seed: [0x42; 32],
            author: "alice",
            timestamp: 1736870400000, // 2026-01-14T12:00:00Z
            content: "hello",
            kind: DocumentKind::Post,
            expected_id: "",
        },
        GoldenVector {
            name: "thread root with description",
            seed: [0x42; 32],
            author: "alice",
            timestamp: 1736870401000,
            content: "Gardening\nTomatoes mostly",
            kind: DocumentKind::ThreadRoot,
            expected_id: "",
        },
        GoldenVector {
            name: "empty post at epoch",
            seed: [0x00; 32],
            author: "zero",
            timestamp: 0,
            content: "",
            kind: DocumentKind::Post,
            expected_id: "",
        },
        GoldenVector {
            name: "multibyte content",
            seed: [0x01; 32],
            author: "bob",
            timestamp: 1736870402000,
            content: "héllo wörld ✓",
            kind: DocumentKind::Post,
            expected_id: "",
        },
    ]
}

/// Build the signed document a vector describes.
pub fn document_from_vector(vector: &GoldenVector) -> Document {
    let keypair = Keypair::from_seed(&vector.seed);
    DocumentBuilder::new(keypair.public_key(), vector.author)
        .kind(vector.kind)
        .timestamp(vector.timestamp)
        .content(vector.content)
        .sign(&keypair)
}

/// Derive every output of a vector.
pub fn vector_output(vector: &GoldenVector) -> VectorOutput {
    let doc = document_from_vector(vector);
    VectorOutput {
        name: vector.name.to_string(),
        seed: hex::encode(vector.seed),
        pubkey: doc.pubkey.to_hex(),
        id: doc.id.to_hex(),
        signing_bytes: hex::encode(document_signing_bytes(&doc)),
        signature: doc.signature.to_hex(),
    }
}

/// All vector outputs as pretty JSON.
pub fn export_vectors() -> serde_json::Result<String> {
    let outputs: Vec<VectorOutput> = all_vectors().iter().map(vector_output).collect();
    serde_json::to_string_pretty(&outputs)
}

/// Check every vector against its pinned id.
///
/// Returns `(name, matches, derived id)`; unpinned vectors always match.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = document_from_vector(v).id.to_hex();
            let matches = v.expected_id.is_empty() || hex == v.expected_id;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}
