//! Document verification: signature and structural checks.
//!
//! `Ok(())` means valid; `Err(reason)` means invalid. Verification is cheap
//! enough to run on every read from persistent storage.

use crate::canonical::document_signing_bytes;
use crate::document::{Document, DocumentKind, MAX_CONTENT_LEN, MAX_PARTICIPANTS};
use crate::error::ValidationError;
use crate::id::derive_id;
use crate::identity::MAX_DISPLAY_NAME_LEN;

/// Verify a document completely.
///
/// This performs:
/// - Structural rules (sizes, content type, kind requirements)
/// - Id derivation check
/// - Signature verification against `document.pubkey`
pub fn verify_document(doc: &Document) -> Result<(), ValidationError> {
    validate_document_structure(doc)?;

    let derived = derive_id(&doc.pubkey, doc.timestamp, &doc.content);
    if derived != doc.id {
        return Err(ValidationError::IdMismatch {
            claimed: doc.id,
            derived,
        });
    }

    doc.pubkey
        .verify(&document_signing_bytes(doc), &doc.signature)
        .map_err(|_| ValidationError::SignatureFailed)
}

/// Verify a document and require that `expected` authored it.
pub fn verify_document_from(
    doc: &Document,
    expected: &crate::crypto::Ed25519PublicKey,
) -> Result<(), ValidationError> {
    if &doc.pubkey != expected {
        return Err(ValidationError::AuthorMismatch {
            expected: expected.to_hex(),
            got: doc.pubkey.to_hex(),
        });
    }
    verify_document(doc)
}

/// Structural checks without touching the signature.
pub fn validate_document_structure(doc: &Document) -> Result<(), ValidationError> {
    if doc.content.len() > MAX_CONTENT_LEN {
        return Err(ValidationError::ContentTooLarge {
            len: doc.content.len(),
            max: MAX_CONTENT_LEN,
        });
    }

    if doc.participants.len() > MAX_PARTICIPANTS {
        return Err(ValidationError::TooManyParticipants(doc.participants.len()));
    }

    if !is_valid_content_type(&doc.content_type) {
        return Err(ValidationError::InvalidContentType(doc.content_type.clone()));
    }

    if doc.author.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::StructuralError("author name too long".into()));
    }

    if doc.kind.requires_reply_to() && doc.reply_to.is_none() {
        return Err(ValidationError::MissingReplyTo {
            kind: doc.kind.as_str(),
        });
    }

    if doc.kind == DocumentKind::ThreadRoot {
        if doc.reply_to.is_some() {
            return Err(ValidationError::StructuralError(
                "thread root cannot reply to another document".into(),
            ));
        }
        if doc.thread_id.is_some_and(|t| t != doc.id) {
            return Err(ValidationError::StructuralError(
                "thread root must belong to its own thread".into(),
            ));
        }
    }

    if doc.reply_to == Some(doc.id) {
        return Err(ValidationError::StructuralError("document replies to itself".into()));
    }

    Ok(())
}

/// `type/subtype`, both non-empty, no whitespace.
fn is_valid_content_type(content_type: &str) -> bool {
    match content_type.split_once('/') {
        Some((kind, sub)) => {
            !kind.is_empty()
                && !sub.is_empty()
                && !content_type.chars().any(char::is_whitespace)
                && !sub.contains('/')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Signature, Keypair};
    use crate::document::DocumentBuilder;
    use crate::types::DocumentId;

    fn make_test_keypair() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    fn make_post(kp: &Keypair) -> Document {
        DocumentBuilder::new(kp.public_key(), "alice")
            .timestamp(1_736_870_400_000)
            .content("hello world")
            .sign(kp)
    }

    #[test]
    fn test_valid_post() {
        let kp = make_test_keypair();
        assert!(verify_document(&make_post(&kp)).is_ok());
    }

    #[test]
    fn test_every_field_is_covered_by_signature() {
        let kp = make_test_keypair();
        let other = Keypair::from_seed(&[7; 32]).public_key();
        let original = make_post(&kp);

        let mutations: Vec<Box<dyn Fn(&mut Document)>> = vec![
            Box::new(|d| d.author = "mallory".into()),
            Box::new(|d| d.content_type = "text/html".into()),
            Box::new(|d| d.kind = DocumentKind::ThreadRoot),
            Box::new(|d| d.reply_to = Some(DocumentId::from_bytes([1; 16]))),
            Box::new(|d| d.thread_id = Some(DocumentId::from_bytes([2; 16]))),
            Box::new(move |d| {
                d.participants.insert(other);
            }),
            Box::new(|d| d.signature = Ed25519Signature::from_bytes([0xff; 64])),
        ];

        for mutate in mutations {
            let mut doc = original.clone();
            mutate(&mut doc);
            assert_eq!(verify_document(&doc), Err(ValidationError::SignatureFailed));
        }
    }

    #[test]
    fn test_content_or_timestamp_change_breaks_id() {
        let kp = make_test_keypair();

        let mut doc = make_post(&kp);
        doc.content = "tampered".into();
        assert!(matches!(verify_document(&doc), Err(ValidationError::IdMismatch { .. })));

        let mut doc = make_post(&kp);
        doc.timestamp += 1;
        assert!(matches!(verify_document(&doc), Err(ValidationError::IdMismatch { .. })));
    }

    #[test]
    fn test_foreign_key_fails() {
        let kp = make_test_keypair();
        let mallory = Keypair::from_seed(&[0x66; 32]);

        // Signed by mallory but claims alice's key.
        let doc = DocumentBuilder::new(kp.public_key(), "alice")
            .timestamp(1)
            .content("forged")
            .sign(&mallory);

        assert_eq!(verify_document(&doc), Err(ValidationError::SignatureFailed));
    }

    #[test]
    fn test_author_mismatch() {
        let kp = make_test_keypair();
        let doc = make_post(&kp);
        let bob = Keypair::from_seed(&[3; 32]).public_key();
        assert!(matches!(
            verify_document_from(&doc, &bob),
            Err(ValidationError::AuthorMismatch { .. })
        ));
        assert!(verify_document_from(&doc, &kp.public_key()).is_ok());
    }

    #[test]
    fn test_reaction_requires_target() {
        let kp = make_test_keypair();
        let doc = DocumentBuilder::new(kp.public_key(), "alice")
            .kind(DocumentKind::Reaction)
            .content("+1")
            .sign(&kp);
        assert_eq!(
            verify_document(&doc),
            Err(ValidationError::MissingReplyTo { kind: "reaction" })
        );
    }

    #[test]
    fn test_oversized_content() {
        let kp = make_test_keypair();
        let doc = DocumentBuilder::new(kp.public_key(), "alice")
            .content("x".repeat(MAX_CONTENT_LEN + 1))
            .sign(&kp);
        assert!(matches!(
            verify_document(&doc),
            Err(ValidationError::ContentTooLarge { .. })
        ));
    }

    #[test]
    fn test_content_type_shapes() {
        assert!(is_valid_content_type("text/plain"));
        assert!(is_valid_content_type("text/markdown"));
        assert!(!is_valid_content_type("text"));
        assert!(!is_valid_content_type("text/"));
        assert!(!is_valid_content_type("/plain"));
        assert!(!is_valid_content_type("text/pl ain"));
        assert!(!is_valid_content_type("a/b/c"));
    }
}
