//! Manifest version arithmetic.
//!
//! A version is `(major, minor, patch, build)` with every component in
//! `[0, 9999]`. [`ManifestVersion::bump`] is the only mutator: it increments
//! `build` and carries into the next component on overflow. Ordering is
//! lexicographic over the four components.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Largest value any version component may hold.
pub const MAX_COMPONENT: u16 = 9999;

/// A four-component manifest version. Field order gives lexicographic `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ManifestVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

impl ManifestVersion {
    /// The version every manifest starts at.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// The highest representable version; bumping it is a no-op.
    pub const MAX: Self = Self::new(MAX_COMPONENT, MAX_COMPONENT, MAX_COMPONENT, MAX_COMPONENT);

    /// Construct a version. Components above [`MAX_COMPONENT`] are clamped.
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        const fn clamp(v: u16) -> u16 {
            if v > MAX_COMPONENT {
                MAX_COMPONENT
            } else {
                v
            }
        }
        Self {
            major: clamp(major),
            minor: clamp(minor),
            patch: clamp(patch),
            build: clamp(build),
        }
    }

    /// Advance by one build, carrying through patch, minor and major.
    ///
    /// Returns `false` when the version is already [`ManifestVersion::MAX`]
    /// and stays saturated.
    pub fn bump(&mut self) -> bool {
        if *self == Self::MAX {
            return false;
        }

        let mut parts = [self.major, self.minor, self.patch, self.build];
        for part in parts.iter_mut().rev() {
            if *part < MAX_COMPONENT {
                *part += 1;
                break;
            }
            *part = 0;
        }

        let [major, minor, patch, build] = parts;
        *self = Self {
            major,
            minor,
            patch,
            build,
        };
        true
    }

    /// The version after one bump, leaving `self` untouched.
    pub fn bumped(mut self) -> Self {
        self.bump();
        self
    }
}

impl fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

impl FromStr for ManifestVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 4 {
            return Err(CoreError::InvalidVersion(s.to_string()));
        }

        let mut values = [0u16; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            let value: u16 = part
                .parse()
                .map_err(|_| CoreError::InvalidVersion(s.to_string()))?;
            if value > MAX_COMPONENT {
                return Err(CoreError::InvalidVersion(s.to_string()));
            }
            *slot = value;
        }

        let [major, minor, patch, build] = values;
        Ok(Self::new(major, minor, patch, build))
    }
}

impl Serialize for ManifestVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ManifestVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
