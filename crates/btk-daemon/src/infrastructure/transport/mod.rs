//! Bluetooth transport: the two HID L2CAP channels.
//!
//! A HID host opens two sequential-packet connections to the peripheral:
//! the *control* channel on PSM 17 and the *interrupt* channel on PSM 19.
//! Input reports travel on the interrupt channel only; the control channel
//! must stay open but its traffic is ignored.
//!
//! # Layout
//!
//! - [`PacketChannel`], [`ChannelListener`] and [`Transport`] are the seams.
//!   The Linux implementation lives in `l2cap`, the in-memory one in `mock`.
//! - `pairing` matches a control connection with the interrupt connection
//!   from the same host.
//! - `listener` drives both listeners and yields complete
//!   [`ConnectionPair`]s.

use std::fmt;
use std::io;

use async_trait::async_trait;

pub mod listener;
pub mod mock;
pub mod pairing;

#[cfg(target_os = "linux")]
pub mod l2cap;

/// HID control channel PSM.
pub const HID_CONTROL_PSM: u16 = 0x11;
/// HID interrupt channel PSM.
pub const HID_INTERRUPT_PSM: u16 = 0x13;

/// Bluetooth device address of a remote host.
///
/// Stored most-significant byte first, the order it is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddr(pub [u8; 6]);

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Which of the two HID channels a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Control,
    Interrupt,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Control => f.write_str("control"),
            ChannelKind::Interrupt => f.write_str("interrupt"),
        }
    }
}

/// One connected, message-oriented channel.
///
/// Both methods take `&self` so that one task can send while another reads
/// the same channel.
#[async_trait]
pub trait PacketChannel: Send + Sync {
    /// Sends one whole packet.
    async fn send(&self, packet: &[u8]) -> io::Result<()>;

    /// Receives one packet into `buf`, returning its length.
    ///
    /// `Ok(0)` means the peer closed the channel.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A bound listener on one PSM.
#[async_trait]
pub trait ChannelListener: Send + Sync {
    /// Waits for the next incoming connection.
    async fn accept(&self) -> io::Result<(Box<dyn PacketChannel>, PeerAddr)>;
}

/// Factory for listeners.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Binds a listener on `psm` on any local adapter.
    async fn bind(&self, psm: u16) -> io::Result<Box<dyn ChannelListener>>;
}

/// The control and interrupt channel of one host, matched by address.
pub struct ConnectionPair {
    pub peer: PeerAddr,
    pub control: Box<dyn PacketChannel>,
    pub interrupt: Box<dyn PacketChannel>,
}

impl fmt::Debug for ConnectionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPair").field("peer", &self.peer).finish_non_exhaustive()
    }
}
