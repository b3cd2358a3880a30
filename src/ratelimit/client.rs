//! Client identifier derivation.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Identifier used when neither a peer address nor a trusted forwarded
/// address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A stable, non-empty string identifying one requester.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap an identifier, substituting [`UNKNOWN_CLIENT`] for blank input.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            Self(UNKNOWN_CLIENT.to_string())
        } else {
            Self(id)
        }
    }

    /// Derive the identifier for a request.
    ///
    /// The first address in `X-Forwarded-For` wins when `trust_forwarded` is
    /// set and it parses as an IP address. Otherwise the peer IP is used; the
    /// port is dropped so reconnects from the same host share one window.
    pub fn from_request_parts(
        peer: Option<SocketAddr>,
        forwarded_for: Option<&str>,
        trust_forwarded: bool,
    ) -> Self {
        if trust_forwarded {
            if let Some(ip) = forwarded_for.and_then(first_forwarded_ip) {
                return Self(ip.to_string());
            }
        }

        match peer {
            Some(addr) => Self(addr.ip().to_string()),
            None => Self(UNKNOWN_CLIENT.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn first_forwarded_ip(header: &str) -> Option<IpAddr> {
    header.split(',').next()?.trim().parse().ok()
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
