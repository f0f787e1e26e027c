//! Canonical CBOR encoding of signed records.
//!
//! Signatures are computed over a deterministic encoding rather than the
//! JSON that travels between peers, so that key order, whitespace and
//! number formatting in JSON can never break verification. The encoding
//! follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Timestamps are i64 milliseconds, never floats
//!
//! Every signed map carries a `type` key so a signature over one record kind
//! can never be replayed as another.

use ciborium::value::Value;

use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::document::Document;
use crate::manifest::Manifest;
use crate::profile::Profile;
use crate::types::DocumentId;

/// `type` tags for each signed record.
mod record_type {
    pub const DOCUMENT: &str = "filux/document/v0";
    pub const PROFILE: &str = "filux/profile/v0";
    pub const MANIFEST: &str = "filux/manifest/v0";
}

/// Bytes signed by a document's author: every field except `signature`.
pub fn document_signing_bytes(doc: &Document) -> Vec<u8> {
    let participants = doc.participants.iter().map(pubkey_value).collect();

    let entries = vec![
        text_entry("type", Value::Text(record_type::DOCUMENT.into())),
        text_entry("id", id_value(&doc.id)),
        text_entry("pubkey", pubkey_value(&doc.pubkey)),
        text_entry("author", Value::Text(doc.author.clone())),
        text_entry("timestamp", Value::Integer(doc.timestamp.into())),
        text_entry("content", Value::Text(doc.content.clone())),
        text_entry("content_type", Value::Text(doc.content_type.clone())),
        text_entry("kind", Value::Text(doc.kind.as_str().into())),
        text_entry("reply_to", optional_id(doc.reply_to.as_ref())),
        text_entry("thread_id", optional_id(doc.thread_id.as_ref())),
        text_entry("participants", Value::Array(participants)),
    ];

    encode_canonical(&Value::Map(entries))
}

/// Bytes signed by a profile's owner.
pub fn profile_signing_bytes(profile: &Profile) -> Vec<u8> {
    let entries = vec![
        text_entry("type", Value::Text(record_type::PROFILE.into())),
        text_entry("pubkey", pubkey_value(&profile.pubkey)),
        text_entry("author", Value::Text(profile.author.clone())),
        text_entry("bio", Value::Text(profile.bio.clone())),
        text_entry("pointer", Value::Text(profile.pointer.as_str().into())),
        text_entry("updated_at", Value::Integer(profile.updated_at.into())),
    ];

    encode_canonical(&Value::Map(entries))
}

/// Bytes signed by a manifest's owner: owner, ordered entries and version.
pub fn manifest_signing_bytes(manifest: &Manifest) -> Vec<u8> {
    let entries: Vec<Value> = manifest
        .entries
        .iter()
        .map(|entry| {
            Value::Map(vec![
                text_entry("id", id_value(&entry.id)),
                text_entry(
                    "address",
                    match &entry.address {
                        Some(address) => Value::Text(address.as_str().into()),
                        None => Value::Null,
                    },
                ),
                text_entry("kind", Value::Text(entry.kind.as_str().into())),
                text_entry("added_at", Value::Integer(entry.added_at.into())),
            ])
        })
        .collect();

    let map = vec![
        text_entry("type", Value::Text(record_type::MANIFEST.into())),
        text_entry("owner_pubkey", pubkey_value(&manifest.owner_pubkey)),
        text_entry("entries", Value::Array(entries)),
        text_entry(
            "manifest_version",
            Value::Text(manifest.manifest_version.to_string()),
        ),
    ];

    encode_canonical(&Value::Map(map))
}

/// Hash of a document's full canonical form, signature included.
pub fn document_hash(doc: &Document) -> Blake3Hash {
    let mut bytes = document_signing_bytes(doc);
    bytes.extend_from_slice(doc.signature.as_bytes());
    Blake3Hash::hash(&bytes)
}

fn text_entry(key: &str, value: Value) -> (Value, Value) {
    (Value::Text(key.into()), value)
}

fn pubkey_value(pk: &Ed25519PublicKey) -> Value {
    Value::Bytes(pk.as_bytes().to_vec())
}

fn id_value(id: &DocumentId) -> Value {
    Value::Bytes(id.as_bytes().to_vec())
}

fn optional_id(id: Option<&DocumentId>) -> Value {
    id.map(id_value).unwrap_or(Value::Null)
}

/// Encode a CBOR value deterministically.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value);
    buf
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => {
            let n: i128 = (*i).into();
            if n >= 0 {
                encode_head(buf, 0, n as u64);
            } else {
                // CBOR encodes -1 as 0, -2 as 1, ...
                encode_head(buf, 1, (-1 - n) as u64);
            }
        }
        Value::Bytes(b) => {
            encode_head(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_head(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            encode_head(buf, 4, items.len() as u64);
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Map(entries) => encode_map(buf, entries),
        Value::Tag(tag, inner) => {
            encode_head(buf, 6, *tag);
            encode_value(buf, inner);
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        // Null and any future simple values.
        _ => buf.push(0xf6),
    }
}

/// Write a major type with its argument in the shortest form.
fn encode_head(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Maps are written with keys sorted by their encoded bytes.
fn encode_map(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut encoded: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| (encode_canonical(k), v))
        .collect();
    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    encode_head(buf, 5, encoded.len() as u64);
    for (key, value) in encoded {
        buf.extend_from_slice(&key);
        encode_value(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_integers() {
        assert_eq!(encode_canonical(&Value::Integer(0.into())), vec![0x00]);
        assert_eq!(encode_canonical(&Value::Integer(23.into())), vec![0x17]);
        assert_eq!(encode_canonical(&Value::Integer(24.into())), vec![0x18, 24]);
        assert_eq!(encode_canonical(&Value::Integer((-1).into())), vec![0x20]);
    }

    #[test]
    fn test_large_timestamp_uses_eight_bytes() {
        let ts: i64 = 1_736_870_400_000;
        let bytes = encode_canonical(&Value::Integer(ts.into()));
        assert_eq!(bytes[0], 0x1b);
        assert_eq!(&bytes[1..], &(ts as u64).to_be_bytes());
    }

    #[test]
    fn test_map_key_order_is_independent_of_insertion() {
        let a = Value::Map(vec![
            text_entry("content", Value::Text("x".into())),
            text_entry("id", Value::Integer(1.into())),
        ]);
        let b = Value::Map(vec![
            text_entry("id", Value::Integer(1.into())),
            text_entry("content", Value::Text("x".into())),
        ]);
        assert_eq!(encode_canonical(&a), encode_canonical(&b));
    }

    #[test]
    fn test_shorter_keys_sort_first() {
        let map = Value::Map(vec![
            text_entry("aa", Value::Null),
            text_entry("b", Value::Null),
        ]);
        let bytes = encode_canonical(&map);
        // map(2), text(1) "b", null, text(2) "aa", null
        assert_eq!(bytes, vec![0xa2, 0x61, b'b', 0xf6, 0x62, b'a', b'a', 0xf6]);
    }

    #[test]
    fn test_round_trips_through_ciborium() {
        let value = Value::Map(vec![
            text_entry("n", Value::Integer((-500).into())),
            text_entry("list", Value::Array(vec![Value::Bytes(vec![1, 2, 3])])),
        ]);
        let bytes = encode_canonical(&value);
        let decoded: Value = ciborium::from_reader(&bytes[..]).unwrap();
        assert_eq!(encode_canonical(&decoded), bytes);
    }
}
