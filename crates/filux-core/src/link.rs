//! Shareable links.
//!
//! `fx://<address>` names immutable content; `ipns://<pointer>` names an
//! identity's latest manifest.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{ContentAddress, PointerName};

const CONTENT_SCHEME: &str = "fx://";
const POINTER_SCHEME: &str = "ipns://";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Link {
    Content(ContentAddress),
    Pointer(PointerName),
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Content(address) => write!(f, "{}{}", CONTENT_SCHEME, address),
            Link::Pointer(name) => write!(f, "{}{}", POINTER_SCHEME, name),
        }
    }
}

impl FromStr for Link {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Query strings carry rendering hints only.
        let target = |rest: &str| rest.split('?').next().unwrap_or_default().to_string();

        let link = if let Some(rest) = s.strip_prefix(CONTENT_SCHEME) {
            Link::Content(ContentAddress::new(target(rest)))
        } else if let Some(rest) = s.strip_prefix(POINTER_SCHEME) {
            Link::Pointer(PointerName::new(target(rest)))
        } else {
            return Err(CoreError::InvalidLink(s.to_string()));
        };

        let empty = match &link {
            Link::Content(a) => a.as_str().is_empty(),
            Link::Pointer(p) => p.as_str().is_empty(),
        };
        if empty || s.contains(char::is_whitespace) {
            return Err(CoreError::InvalidLink(s.to_string()));
        }
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let link: Link = "fx://bafkabc".parse().unwrap();
        assert_eq!(link, Link::Content(ContentAddress::new("bafkabc")));
        assert_eq!(link.to_string(), "fx://bafkabc");

        let link: Link = "ipns://k51xyz".parse().unwrap();
        assert_eq!(link, Link::Pointer(PointerName::new("k51xyz")));
        assert_eq!(link.to_string(), "ipns://k51xyz");
    }

    #[test]
    fn test_query_is_dropped() {
        let link: Link = "fx://bafkabc?author=alice".parse().unwrap();
        assert_eq!(link, Link::Content(ContentAddress::new("bafkabc")));
    }

    #[test]
    fn test_rejects_other_schemes() {
        for bad in ["https://example.com", "fx://", "bafkabc", "ipns://?x=1", "fx://a b"] {
            assert!(bad.parse::<Link>().is_err(), "accepted {bad:?}");
        }
    }
}
