//! Datagram Listener
//!
//! Owns the bound datagram socket and runs the receive loop feeding the
//! forwarding bridge. The receive buffer is reused across reads; every
//! payload handed to the bridge is an independent copy taken before the
//! loop re-enters `recv`, so a pending publish can never alias the buffer.

use std::sync::Arc;

use bytes::Bytes;
use tokio::net::{UdpSocket, UnixDatagram};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::{resolve_udp, Endpoint, TransportError};
use crate::bridge::ForwardingBridge;

enum ListenSocket {
    Udp(UdpSocket),
    Unix(UnixDatagram),
}

/// Bound datagram socket plus its reusable receive buffer.
pub struct DatagramListener {
    socket: ListenSocket,
    buf: Vec<u8>,
    local: String,
}

impl DatagramListener {
    /// Bind the configured listen endpoint. Binding failure is fatal.
    pub async fn bind(endpoint: &Endpoint, max_msg_size: usize) -> Result<Self, TransportError> {
        let socket = match endpoint {
            Endpoint::Udp { addr, family } => {
                let addr = resolve_udp(addr, *family).await?;
                let socket = UdpSocket::bind(addr).await.map_err(|e| TransportError::Bind {
                    target: endpoint.to_string(),
                    source: e,
                })?;
                ListenSocket::Udp(socket)
            }
            Endpoint::Unix { path } => {
                let socket = UnixDatagram::bind(path).map_err(|e| TransportError::Bind {
                    target: endpoint.to_string(),
                    source: e,
                })?;
                ListenSocket::Unix(socket)
            }
        };

        Ok(Self {
            socket,
            buf: vec![0u8; max_msg_size],
            local: endpoint.to_string(),
        })
    }

    /// The endpoint this listener is bound to, for logging.
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Receive one datagram, returning a copied payload and the peer address.
    ///
    /// Datagrams larger than the receive buffer are truncated by the
    /// transport; this is a documented limitation, not corrected here.
    pub async fn recv(&mut self) -> Result<(Bytes, String), TransportError> {
        let (n, peer) = match &self.socket {
            ListenSocket::Udp(socket) => {
                let (n, addr) = socket
                    .recv_from(&mut self.buf)
                    .await
                    .map_err(TransportError::Read)?;
                (n, addr.to_string())
            }
            ListenSocket::Unix(socket) => {
                let (n, addr) = socket
                    .recv_from(&mut self.buf)
                    .await
                    .map_err(TransportError::Read)?;
                (n, format!("{:?}", addr))
            }
        };

        Ok((Bytes::copy_from_slice(&self.buf[..n]), peer))
    }

    /// Run the receive loop until shutdown is requested.
    ///
    /// Every successful non-empty read is forwarded to the bridge exactly
    /// once, in receive order. Transient read errors are logged and the loop
    /// continues; a shutdown signal exits cleanly without an error entry.
    pub async fn run(
        mut self,
        bridge: Arc<ForwardingBridge>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("listening on [{}]", self.local);

        loop {
            let (payload, peer) = tokio::select! {
                _ = shutdown.recv() => {
                    info!("listener on [{}] shutting down", self.local);
                    return;
                }
                result = self.recv() => match result {
                    Ok(read) => read,
                    Err(e) => {
                        error!("exception reading from [{}]: {}", self.local, e);
                        continue;
                    }
                },
            };

            debug!("recv {} bytes from [{}]", payload.len(), peer);
            if payload.is_empty() {
                continue;
            }

            // The payload copy is complete and the dispatch awaited before
            // the next recv can touch the buffer again.
            bridge.on_packet(payload).await;
        }
    }
}
