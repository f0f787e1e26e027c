//! The local identity: a keypair plus a human-readable name.
//!
//! The public key *is* the identity. Two identities are equal when their
//! keys are equal, whatever their display names say.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::crypto::{Ed25519PublicKey, Keypair};
use crate::error::CoreError;
use crate::types::PointerName;

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Check a display name and return it trimmed.
pub fn validate_display_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidDisplayName("empty".into()));
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(CoreError::InvalidDisplayName(format!(
            "longer than {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CoreError::InvalidDisplayName("contains control characters".into()));
    }
    Ok(trimmed.to_string())
}

/// Signing context passed explicitly to every operation that acts as a user.
#[derive(Clone)]
pub struct Identity {
    keypair: Keypair,
    display_name: String,
}

impl Identity {
    /// Create an identity, validating the display name.
    pub fn new(keypair: Keypair, display_name: &str) -> Result<Self, CoreError> {
        Ok(Self {
            keypair,
            display_name: validate_display_name(display_name)?,
        })
    }

    /// Generate a fresh identity.
    pub fn generate(display_name: &str) -> Result<Self, CoreError> {
        Self::new(Keypair::generate(), display_name)
    }

    /// The same key under a new display name.
    pub fn renamed(&self, display_name: &str) -> Result<Self, CoreError> {
        Self::new(self.keypair.clone(), display_name)
    }

    pub fn pubkey(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The mutable pointer this identity publishes its manifest under.
    pub fn pointer(&self) -> PointerName {
        PointerName::for_identity(&self.pubkey())
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.pubkey() == other.pubkey()
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pubkey().hash(state);
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("pubkey", &self.pubkey())
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_display_name() {
        let kp = Keypair::from_seed(&[1; 32]);
        let a = Identity::new(kp.clone(), "alice").unwrap();
        let b = Identity::new(kp, "someone else").unwrap();
        assert_eq!(a, b);

        let c = Identity::new(Keypair::from_seed(&[2; 32]), "alice").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_name_validation() {
        assert_eq!(validate_display_name("  bob ").unwrap(), "bob");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(65)).is_err());
        assert!(validate_display_name("bad\nname").is_err());
    }
}
