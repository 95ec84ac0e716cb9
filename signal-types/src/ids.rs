//! Identity types for the signaling relay.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A self-declared identifier for a peer.
///
/// Opaque to the relay: any string is accepted, and no uniqueness is
/// enforced beyond the registry's overwrite semantics.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Create a ClientId from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn client_id_serializes_as_plain_string() {
        let id = ClientId::new("peer-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"peer-1\"");
    }

    #[test]
    fn client_id_display_is_raw_text() {
        assert_eq!(ClientId::from("alice").to_string(), "alice");
        assert_eq!(format!("{:?}", ClientId::from("alice")), "ClientId(\"alice\")");
    }

    #[test]
    fn client_id_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ClientId::from("bob"), 7);
        assert_eq!(map.get("bob"), Some(&7));
    }

    #[test]
    fn empty_id_is_accepted() {
        // The relay does not validate identifiers
        let id = ClientId::new("");
        assert_eq!(id.as_str(), "");
    }
}
