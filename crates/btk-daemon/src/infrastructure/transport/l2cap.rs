//! L2CAP sequential-packet transport backed by the kernel Bluetooth stack.
//!
//! Binding PSM 17 and 19 only succeeds when no other process (usually
//! BlueZ's own `input` plugin) holds them.

use std::io;

use async_trait::async_trait;
use bluer::l2cap::{SeqPacket, SeqPacketListener, SocketAddr};
use bluer::{Address, AddressType};
use tracing::debug;

use super::{ChannelListener, PacketChannel, PeerAddr, Transport};

/// Binds listeners on the BR/EDR any-address.
#[derive(Debug, Default, Clone, Copy)]
pub struct L2capTransport;

impl L2capTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for L2capTransport {
    async fn bind(&self, psm: u16) -> io::Result<Box<dyn ChannelListener>> {
        let addr = SocketAddr::new(Address::any(), AddressType::BrEdr, psm);
        let listener = SeqPacketListener::bind(addr).await?;
        debug!("listening on L2CAP psm {psm}");
        Ok(Box::new(L2capListener { inner: listener, psm }))
    }
}

/// A bound L2CAP listener on one PSM.
pub struct L2capListener {
    inner: SeqPacketListener,
    psm: u16,
}

#[async_trait]
impl ChannelListener for L2capListener {
    async fn accept(&self) -> io::Result<(Box<dyn PacketChannel>, PeerAddr)> {
        let (socket, remote) = self.inner.accept().await?;
        debug!("psm {}: connection from {}", self.psm, remote.addr);
        Ok((Box::new(L2capChannel(socket)), PeerAddr(remote.addr.0)))
    }
}

/// One connected L2CAP channel.
pub struct L2capChannel(SeqPacket);

#[async_trait]
impl PacketChannel for L2capChannel {
    async fn send(&self, packet: &[u8]) -> io::Result<()> {
        let written = self.0.send(packet).await?;
        if written != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short L2CAP write: {written} of {} bytes", packet.len()),
            ));
        }
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf).await
    }
}
