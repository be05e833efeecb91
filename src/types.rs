use serde::{Deserialize, Serialize};

/// Normalized identity of a remote peer: an IPv4 literal, an IPv6 literal
/// with its brackets stripped, or a hostname. Never carries a port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One established connection attributed to the application holding it.
///
/// Two values are the same peer only if both the application and the address
/// match; the same remote spoken to by two applications yields two entries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerWithApp {
    pub application: String,
    pub address: PeerAddress,
}
