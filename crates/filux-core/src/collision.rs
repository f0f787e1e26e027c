//! Display-name collision detection.
//!
//! Display names are advisory. Two distinct keys may claim the same name;
//! this module only reports it. Rendering and warnings are up to the caller.

use std::collections::{BTreeMap, BTreeSet};

use crate::crypto::Ed25519PublicKey;

/// Two or more keys sharing one normalized display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The normalized name they share.
    pub display_name: String,
    /// Every key seen under that name, including the one checked.
    pub pubkeys: BTreeSet<Ed25519PublicKey>,
}

/// Normalize a display name for comparison: trim, strip `@`, lowercase.
pub fn normalize_display_name(name: &str) -> String {
    name.trim().trim_matches('@').trim().to_lowercase()
}

/// Check `(display_name, pubkey)` against the identities seen so far.
pub fn check<'a, I>(display_name: &str, pubkey: &Ed25519PublicKey, known: I) -> Option<Collision>
where
    I: IntoIterator<Item = (&'a str, &'a Ed25519PublicKey)>,
{
    let normalized = normalize_display_name(display_name);
    let mut pubkeys = BTreeSet::from([*pubkey]);

    for (name, key) in known {
        if normalize_display_name(name) == normalized {
            pubkeys.insert(*key);
        }
    }

    (pubkeys.len() > 1).then_some(Collision {
        display_name: normalized,
        pubkeys,
    })
}

/// Every collision within a set of identities, ordered by name.
pub fn detect_all<'a, I>(identities: I) -> Vec<Collision>
where
    I: IntoIterator<Item = (&'a str, &'a Ed25519PublicKey)>,
{
    let mut by_name: BTreeMap<String, BTreeSet<Ed25519PublicKey>> = BTreeMap::new();
    for (name, key) in identities {
        by_name
            .entry(normalize_display_name(name))
            .or_default()
            .insert(*key);
    }

    by_name
        .into_iter()
        .filter(|(_, keys)| keys.len() > 1)
        .map(|(display_name, pubkeys)| Collision {
            display_name,
            pubkeys,
        })
        .collect()
}

/// Render a name with a short key suffix, e.g. `alice (1a2b3c)`.
pub fn disambiguate(display_name: &str, pubkey: &Ed25519PublicKey) -> String {
    format!("{} ({})", display_name, pubkey.short())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Ed25519PublicKey {
        Ed25519PublicKey::from_bytes([n; 32])
    }

    #[test]
    fn test_same_name_different_keys_collides() {
        let alice_one = key(1);
        let alice_two = key(2);
        let known = [("alice", &alice_one)];

        let collision = check("alice", &alice_two, known).unwrap();
        assert_eq!(collision.display_name, "alice");
        assert_eq!(collision.pubkeys, BTreeSet::from([alice_one, alice_two]));
    }

    #[test]
    fn test_same_key_twice_is_not_a_collision() {
        let alice = key(1);
        let known = [("alice", &alice), ("alice", &alice)];
        assert!(check("alice", &alice, known).is_none());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_display_name("  @Alice "), "alice");
        assert_eq!(normalize_display_name("@@bob@"), "bob");

        let a = key(1);
        let b = key(2);
        assert!(check("@ALICE", &b, [("alice", &a)]).is_some());
        assert!(check("alicia", &b, [("alice", &a)]).is_none());
    }

    #[test]
    fn test_detect_all() {
        let (a, b, c, d) = (key(1), key(2), key(3), key(4));
        let identities = [
            ("alice", &a),
            ("bob", &b),
            ("Alice", &c),
            ("bob", &b),
            ("carol", &d),
        ];
        let collisions = detect_all(identities);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].pubkeys, BTreeSet::from([a, c]));
    }

    #[test]
    fn test_disambiguate() {
        let k = Ed25519PublicKey::from_bytes([0x1a; 32]);
        assert_eq!(disambiguate("alice", &k), "alice (1a1a1a)");
    }
}
