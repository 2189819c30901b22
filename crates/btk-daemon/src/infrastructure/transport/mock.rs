//! In-memory transport for tests.
//!
//! [`channel_pair`] builds two connected [`MockChannel`] ends.  A
//! [`MockTransport`] hands out [`MockListener`]s whose connections are made
//! by the test through a [`MockConnector`], playing the part of the host.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::{ChannelListener, PacketChannel, PeerAddr, Transport};

/// Packets each direction buffers before `send` waits.
const DEFAULT_CAPACITY: usize = 64;

/// One end of an in-memory packet channel.
///
/// `recv` returns `Ok(0)` once the other end is dropped; `send` then fails
/// with `ConnectionReset`.
pub struct MockChannel {
    tx: mpsc::Sender<Vec<u8>>,
    rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
}

/// Creates two connected ends.
pub fn channel_pair() -> (MockChannel, MockChannel) {
    channel_pair_with_capacity(DEFAULT_CAPACITY)
}

/// Creates two connected ends buffering `capacity` packets per direction.
///
/// A small capacity with an idle reader models a host that stopped reading.
pub fn channel_pair_with_capacity(capacity: usize) -> (MockChannel, MockChannel) {
    let (a_tx, a_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, b_rx) = mpsc::channel(capacity.max(1));
    (
        MockChannel {
            tx: a_tx,
            rx: AsyncMutex::new(b_rx),
        },
        MockChannel {
            tx: b_tx,
            rx: AsyncMutex::new(a_rx),
        },
    )
}

impl MockChannel {
    /// Receives the next packet as an owned buffer, `None` once closed.
    pub async fn recv_packet(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }

    /// Returns a packet that has already arrived without waiting.
    pub fn try_recv_packet(&self) -> Option<Vec<u8>> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait]
impl PacketChannel for MockChannel {
    async fn send(&self, packet: &[u8]) -> io::Result<()> {
        self.tx
            .send(packet.to_vec())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionReset, "peer closed"))
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.recv_packet().await {
            Some(packet) => {
                let n = packet.len().min(buf.len());
                buf[..n].copy_from_slice(&packet[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }
}

type Incoming = io::Result<(MockChannel, PeerAddr)>;

/// Listener side of an in-memory PSM.
pub struct MockListener {
    incoming: AsyncMutex<mpsc::UnboundedReceiver<Incoming>>,
}

/// Host side of an in-memory PSM.
#[derive(Clone)]
pub struct MockConnector {
    tx: mpsc::UnboundedSender<Incoming>,
}

/// Creates a connected listener and connector.
pub fn listener() -> (MockListener, MockConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockListener {
            incoming: AsyncMutex::new(rx),
        },
        MockConnector { tx },
    )
}

impl MockConnector {
    /// Connects as `peer`, returning the host's end of the new channel.
    pub fn connect(&self, peer: PeerAddr) -> io::Result<MockChannel> {
        self.connect_with_capacity(peer, DEFAULT_CAPACITY)
    }

    pub fn connect_with_capacity(&self, peer: PeerAddr, capacity: usize) -> io::Result<MockChannel> {
        let (daemon_end, host_end) = channel_pair_with_capacity(capacity);
        self.tx
            .send(Ok((daemon_end, peer)))
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "listener closed"))?;
        Ok(host_end)
    }

    /// Makes the next `accept` fail with `kind`.
    pub fn fail_next_accept(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Err(io::Error::new(kind, "injected accept failure")));
    }
}

#[async_trait]
impl ChannelListener for MockListener {
    async fn accept(&self) -> io::Result<(Box<dyn PacketChannel>, PeerAddr)> {
        let mut incoming = self.incoming.lock().await;
        match incoming.recv().await {
            Some(Ok((channel, peer))) => Ok((Box::new(channel), peer)),
            Some(Err(e)) => Err(e),
            // No more hosts; behave like an idle socket.
            None => std::future::pending().await,
        }
    }
}

/// A [`Transport`] whose PSMs are prepared by the test.
///
/// Binding a PSM that was never prepared fails with `AddrNotAvailable`;
/// each prepared PSM can be bound once.
#[derive(Default)]
pub struct MockTransport {
    listeners: Mutex<HashMap<u16, MockListener>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares `psm` and returns the connector the host uses to reach it.
    pub fn listen(&self, psm: u16) -> MockConnector {
        let (listener, connector) = listener();
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(psm, listener);
        connector
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn bind(&self, psm: u16) -> io::Result<Box<dyn ChannelListener>> {
        let listener = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&psm)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, format!("psm {psm} not available"))
            })?;
        Ok(Box::new(listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_pair_delivers_whole_packets() {
        // Arrange
        let (a, b) = channel_pair();
        let mut buf = [0u8; 16];

        // Act
        a.send(&[0xA1, 0x02, 0x00]).await.unwrap();
        let n = b.recv(&mut buf).await.unwrap();

        // Assert
        assert_eq!(&buf[..n], &[0xA1, 0x02, 0x00]);
    }

    #[tokio::test]
    async fn test_dropped_end_reads_as_closed() {
        let (a, b) = channel_pair();
        drop(a);

        let mut buf = [0u8; 4];
        assert_eq!(b.recv(&mut buf).await.unwrap(), 0);
        let err = b.send(&[1]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_listener_accepts_connection_with_peer_address() {
        // Arrange
        let (listener, connector) = listener();
        let peer = PeerAddr([1, 2, 3, 4, 5, 6]);

        // Act
        let host = connector.connect(peer).unwrap();
        let (channel, accepted_peer) = listener.accept().await.unwrap();
        channel.send(&[9]).await.unwrap();

        // Assert
        assert_eq!(accepted_peer, peer);
        assert_eq!(host.recv_packet().await, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_injected_accept_failure_is_returned() {
        let (listener, connector) = listener();
        connector.fail_next_accept(io::ErrorKind::Other);

        let err = listener.accept().await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_transport_binds_prepared_psm_once() {
        let transport = MockTransport::new();
        let _connector = transport.listen(0x11);

        assert!(transport.bind(0x11).await.is_ok());
        let err = transport.bind(0x11).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
    }
}
