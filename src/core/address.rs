//! Address pair: the lookup key for connections and dockers.

use std::fmt;
use std::net::SocketAddr;

/// A `(remote, local)` address tuple identifying one logical peer link.
///
/// `local` may be `None` for connectionless sockets where the local side is
/// a wildcard (typically an ephemeral port bound on first send). At most one
/// live connection and at most one live docker exist per distinct pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressPair {
    remote: SocketAddr,
    local: Option<SocketAddr>,
}

impl AddressPair {
    /// Create a pair from a remote address and an optional local address.
    pub fn new(remote: SocketAddr, local: Option<SocketAddr>) -> Self {
        Self { remote, local }
    }

    /// The remote peer address.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// The local address, if pinned.
    pub fn local(&self) -> Option<SocketAddr> {
        self.local
    }
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local {
            Some(local) => write!(f, "{} <- {}", self.remote, local),
            None => write!(f, "{} <- *", self.remote),
        }
    }
}

impl From<SocketAddr> for AddressPair {
    fn from(remote: SocketAddr) -> Self {
        Self::new(remote, None)
    }
}
