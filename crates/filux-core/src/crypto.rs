//! Cryptographic primitives for filux.
//!
//! Wraps Ed25519 signing and Blake3 hashing with strong types. Keys, hashes
//! and signatures serialize as lowercase hex so signed JSON stays readable.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;

use crate::error::CoreError;

pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], hex::FromHexError> {
    <[u8; N]>::try_from(hex::decode(s)?.as_slice())
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}

/// Fixed-size byte newtypes: raw access, hex, short debug output and hex
/// serde.
macro_rules! byte_newtype {
    ($(#[$meta:meta])* $name:ident, $len:literal, $label:literal) => {
        $(#[$meta])*
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex, the wire form.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                decode_fixed(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        hex_serde!($name);
    };
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $ty {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                <$ty>::from_hex(&s).map_err(::serde::de::Error::custom)
            }
        }
    };
}
pub(crate) use hex_serde;

byte_newtype!(
    /// BLAKE3 digest. Ids, content hashes and pointer names derive from it.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    Blake3Hash,
    32,
    "Blake3"
);

impl Blake3Hash {
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash `data` under a domain-separation prefix.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }
}

byte_newtype!(
    /// An identity: the Ed25519 verifying key, 32 bytes.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    Ed25519PublicKey,
    32,
    "Pubkey"
);

impl Ed25519PublicKey {
    /// First six hex characters, used to disambiguate display names.
    pub fn short(&self) -> String {
        self.to_hex()[..6].to_string()
    }

    /// Check `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

byte_newtype!(
    /// Detached Ed25519 signature.
    #[derive(Clone, Copy, PartialEq, Eq)]
    Ed25519Signature,
    64,
    "Sig"
);

impl Ed25519Signature {
    /// Placeholder carried by unsigned records; never verifies.
    pub const ZERO: Self = Self([0u8; 64]);
}

/// Signing half of an identity. Only the seed is ever persisted.
#[derive(Clone)]
pub struct Keypair {
    inner: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic keypair; the same seed always yields the same identity.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.inner.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.inner.sign(message).to_bytes())
    }

    /// Secret seed, for the local identity table only.
    pub fn seed(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    // Never print secret material.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.public_key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"manifest bytes");

        assert!(keypair.public_key().verify(b"manifest bytes", &signature).is_ok());
        assert!(keypair.public_key().verify(b"manifest byteS", &signature).is_err());
    }

    #[test]
    fn test_foreign_key_rejected() {
        let alice = Keypair::from_seed(&[1; 32]);
        let mallory = Keypair::from_seed(&[2; 32]);
        let signature = mallory.sign(b"post");
        assert!(alice.public_key().verify(b"post", &signature).is_err());
    }

    #[test]
    fn test_seed_round_trips_identity() {
        let original = Keypair::from_seed(&[0x42; 32]);
        let reloaded = Keypair::from_seed(&original.seed());
        assert_eq!(original.public_key(), reloaded.public_key());
        assert!(!format!("{:?}", original).contains(&hex::encode(original.seed())));
    }

    #[test]
    fn test_domain_separation() {
        let a = Blake3Hash::hash_with_domain(b"a:", b"data");
        let b = Blake3Hash::hash_with_domain(b"b:", b"data");
        assert_ne!(a, b);
        assert_ne!(a, Blake3Hash::hash(b"data"));
    }

    #[test]
    fn test_public_key_json_is_hex() {
        let pk = Keypair::from_seed(&[7; 32]).public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_hex()));

        let back: Ed25519PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn test_signature_rejects_short_hex() {
        let result: Result<Ed25519Signature, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }
}
