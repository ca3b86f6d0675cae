//! Datagram Sender
//!
//! Thin wrapper around a socket dialed once at startup against the
//! configured send_to destination. Writes are serialized so each message
//! goes out as one complete datagram, and bounded by a timeout so a stuck
//! peer cannot stall the MQTT delivery path.

use std::time::Duration;

use tokio::net::{UdpSocket, UnixDatagram};
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::{resolve_udp, Endpoint, TransportError};

/// Upper bound for a single datagram write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

enum SendSocket {
    Udp(UdpSocket),
    Unix(UnixDatagram),
}

/// Dialed datagram socket with serialized, timeout-bounded writes.
pub struct DatagramSender {
    socket: Mutex<SendSocket>,
    target: String,
}

impl DatagramSender {
    /// Dial the configured send_to endpoint. Dial failure is fatal.
    pub async fn dial(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let socket = match endpoint {
            Endpoint::Udp { addr, family } => {
                let target = resolve_udp(addr, *family).await?;
                let local: std::net::SocketAddr = if target.is_ipv6() {
                    "[::]:0".parse().unwrap()
                } else {
                    "0.0.0.0:0".parse().unwrap()
                };
                let socket = UdpSocket::bind(local).await.map_err(|e| TransportError::Dial {
                    target: endpoint.to_string(),
                    source: e,
                })?;
                socket.connect(target).await.map_err(|e| TransportError::Dial {
                    target: endpoint.to_string(),
                    source: e,
                })?;
                SendSocket::Udp(socket)
            }
            Endpoint::Unix { path } => {
                let socket = UnixDatagram::unbound().map_err(|e| TransportError::Dial {
                    target: endpoint.to_string(),
                    source: e,
                })?;
                socket.connect(path).map_err(|e| TransportError::Dial {
                    target: endpoint.to_string(),
                    source: e,
                })?;
                SendSocket::Unix(socket)
            }
        };

        Ok(Self {
            socket: Mutex::new(socket),
            target: endpoint.to_string(),
        })
    }

    /// The endpoint this sender is dialed to, for logging.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Write one payload as a single datagram.
    ///
    /// Writes from concurrent callers are serialized by the internal lock,
    /// so datagram boundaries are never interleaved.
    pub async fn write(&self, payload: &[u8]) -> Result<(), TransportError> {
        let socket = self.socket.lock().await;

        let send = async {
            match &*socket {
                SendSocket::Udp(s) => s.send(payload).await,
                SendSocket::Unix(s) => s.send(payload).await,
            }
        };

        match timeout(WRITE_TIMEOUT, send).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(e)),
            Err(_) => Err(TransportError::WriteTimeout),
        }
    }
}
