//! Datagram Transport
//!
//! Socket-facing half of the bridge: address parsing for the supported
//! datagram schemes, the bound listener that feeds the forwarding bridge,
//! and the dialed sender that delivers subscribed messages.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

mod listener;
mod sender;

pub use listener::DatagramListener;
pub use sender::DatagramSender;

/// Error type for datagram transport operations
#[derive(Debug)]
pub enum TransportError {
    /// Address could not be parsed or resolved
    Address(String),
    /// Failed to bind the listen socket
    Bind { target: String, source: std::io::Error },
    /// Failed to dial the send_to destination
    Dial { target: String, source: std::io::Error },
    /// Read from the listen socket failed
    Read(std::io::Error),
    /// Write to the send_to destination failed
    Write(std::io::Error),
    /// Write did not complete within the bounded timeout
    WriteTimeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Address(msg) => write!(f, "{}", msg),
            TransportError::Bind { target, source } => {
                write!(f, "failed to bind [{}]: {}", target, source)
            }
            TransportError::Dial { target, source } => {
                write!(f, "failed to dial [{}]: {}", target, source)
            }
            TransportError::Read(e) => write!(f, "read failed: {}", e),
            TransportError::Write(e) => write!(f, "write failed: {}", e),
            TransportError::WriteTimeout => write!(f, "write timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Address family restriction for UDP endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// First resolved address of either family
    Any,
    /// IPv4 only (`udp4://`)
    V4,
    /// IPv6 only (`udp6://`)
    V6,
}

impl Family {
    fn matches(&self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

/// A parsed datagram endpoint (`udp|udp4|udp6|unixgram://...`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// UDP endpoint; `addr` is `host:port`, resolved at bind/dial time
    Udp { addr: String, family: Family },
    /// Unix datagram endpoint; filesystem path
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Parse a `scheme://address` URL into an endpoint.
    ///
    /// Only shape and scheme are checked here; DNS resolution happens when
    /// the endpoint is bound or dialed.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| TransportError::Address(format!("missing scheme in [{}]", url)))?;

        if rest.is_empty() {
            return Err(TransportError::Address(format!("empty address in [{}]", url)));
        }

        match scheme {
            "udp" => Ok(Endpoint::Udp {
                addr: rest.to_string(),
                family: Family::Any,
            }),
            "udp4" => Ok(Endpoint::Udp {
                addr: rest.to_string(),
                family: Family::V4,
            }),
            "udp6" => Ok(Endpoint::Udp {
                addr: rest.to_string(),
                family: Family::V6,
            }),
            "unixgram" => Ok(Endpoint::Unix {
                path: PathBuf::from(rest),
            }),
            other => Err(TransportError::Address(format!(
                "unsupported scheme [{}] in [{}]",
                other, url
            ))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Udp { addr, family } => match family {
                Family::Any => write!(f, "udp://{}", addr),
                Family::V4 => write!(f, "udp4://{}", addr),
                Family::V6 => write!(f, "udp6://{}", addr),
            },
            Endpoint::Unix { path } => write!(f, "unixgram://{}", path.display()),
        }
    }
}

/// Resolve a UDP endpoint address, honoring the family restriction.
async fn resolve_udp(addr: &str, family: Family) -> Result<SocketAddr, TransportError> {
    let addrs = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| TransportError::Address(format!("failed to resolve [{}]: {}", addr, e)))?;

    addrs
        .into_iter()
        .find(|a| family.matches(a))
        .ok_or_else(|| {
            TransportError::Address(format!("no matching address for [{}]", addr))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_udp() {
        let ep = Endpoint::parse("udp://127.0.0.1:9000").unwrap();
        assert_eq!(
            ep,
            Endpoint::Udp {
                addr: "127.0.0.1:9000".to_string(),
                family: Family::Any,
            }
        );
        assert_eq!(ep.to_string(), "udp://127.0.0.1:9000");
    }

    #[test]
    fn test_parse_udp_families() {
        assert!(matches!(
            Endpoint::parse("udp4://localhost:9000").unwrap(),
            Endpoint::Udp {
                family: Family::V4,
                ..
            }
        ));
        assert!(matches!(
            Endpoint::parse("udp6://localhost:9000").unwrap(),
            Endpoint::Udp {
                family: Family::V6,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_unixgram() {
        let ep = Endpoint::parse("unixgram:///tmp/mqfwd.sock").unwrap();
        assert_eq!(
            ep,
            Endpoint::Unix {
                path: PathBuf::from("/tmp/mqfwd.sock"),
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(Endpoint::parse("tcp://127.0.0.1:9000").is_err());
        assert!(Endpoint::parse("http://example.com").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        assert!(Endpoint::parse("127.0.0.1:9000").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_address() {
        assert!(Endpoint::parse("udp://").is_err());
    }
}
