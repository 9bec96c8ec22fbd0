use std::fmt;
use std::net::SocketAddr;

/// Session address backed by the transport's opaque session identifier.
///
/// Equality and hashing use the identifier string only, so sessions can be
/// looked up without knowing the transport's native address form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentifierAddress {
    identifier: String,
}

impl IdentifierAddress {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for IdentifierAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

impl From<&str> for IdentifierAddress {
    fn from(identifier: &str) -> Self {
        Self::new(identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerAddress {
    /// A transport session.
    Identifier(IdentifierAddress),
    /// A raw datagram source outside any session.
    Socket(SocketAddr),
}

impl PeerAddress {
    pub fn session(identifier: impl Into<String>) -> Self {
        PeerAddress::Identifier(IdentifierAddress::new(identifier))
    }

    pub fn as_identifier(&self) -> Option<&IdentifierAddress> {
        match self {
            PeerAddress::Identifier(address) => Some(address),
            PeerAddress::Socket(_) => None,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddress::Identifier(address) => address.fmt(f),
            PeerAddress::Socket(addr) => addr.fmt(f),
        }
    }
}

impl From<IdentifierAddress> for PeerAddress {
    fn from(address: IdentifierAddress) -> Self {
        PeerAddress::Identifier(address)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        PeerAddress::Socket(addr)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn identity_is_the_identifier() {
        let a = IdentifierAddress::new("10.0.0.1:5000");
        let b = IdentifierAddress::from("10.0.0.1:5000");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.0.0.1:5000");
        assert_ne!(a, IdentifierAddress::new("10.0.0.1:5001"));

        let mut players = HashMap::new();
        players.insert(PeerAddress::from(a), "steve");
        assert_eq!(players.get(&PeerAddress::session("10.0.0.1:5000")), Some(&"steve"));
    }

    #[test]
    fn socket_address_renders_ip_and_port() {
        let addr: SocketAddr = "203.0.113.5:19132".parse().unwrap();
        let peer = PeerAddress::from(addr);

        assert_eq!(peer.to_string(), "203.0.113.5:19132");
        assert!(peer.as_identifier().is_none());
    }
}
