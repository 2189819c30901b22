//! Lifecycle of one connected host.
//!
//! ```text
//! Accepted ──run()──▶ Active ──first task exits──▶ Closing ──▶ Closed
//! ```
//!
//! While `Active`, these tasks run concurrently:
//!
//! - **send**: takes reports from the session's queue on the [`ReportBus`]
//!   and writes them to the interrupt channel.
//! - **control-read** and **interrupt-read**: read and discard whatever the
//!   host sends.  A zero-length read means the host hung up.
//! - **overflow**: resolves when the bus evicts the queue, even while the
//!   send task is stuck writing to a host that stopped reading.
//!
//! Whichever task finishes first decides the session's [`SessionExit`]; the
//! others are aborted and awaited before the queue is deregistered and both
//! channels are closed.  The queue and the channels are owned by RAII
//! values, so they are also released if the session future itself is
//! dropped.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::application::report_bus::{ReportBus, ReportQueue, SessionId};
use crate::infrastructure::transport::{ChannelKind, ConnectionPair, PacketChannel, PeerAddr};

/// Default number of reports buffered per session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default size of the buffer host traffic is read into.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 64;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Active,
    Closing,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// The host closed one of the channels.
    PeerClosed(ChannelKind),
    /// Reading a channel failed.
    ReadFailed(ChannelKind, io::ErrorKind),
    /// Writing a report to the interrupt channel failed.
    SendFailed(io::ErrorKind),
    /// The session's queue was removed from the bus.
    QueueClosed,
    /// The host fell behind and the bus evicted the session's queue.
    Overflow,
    /// A session task panicked.
    TaskFailed(String),
}

impl fmt::Display for SessionExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionExit::PeerClosed(kind) => write!(f, "host closed the {kind} channel"),
            SessionExit::ReadFailed(kind, err) => write!(f, "{kind} channel read failed: {err}"),
            SessionExit::SendFailed(err) => write!(f, "report send failed: {err}"),
            SessionExit::QueueClosed => f.write_str("outbound queue closed"),
            SessionExit::Overflow => f.write_str("outbound queue overflowed"),
            SessionExit::TaskFailed(msg) => write!(f, "session task failed: {msg}"),
        }
    }
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    pub recv_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }
}

/// Outcome of a finished session, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub peer: PeerAddr,
    pub exit: SessionExit,
    pub reports_sent: u64,
}

/// One host's pair of channels and its lifecycle state.
pub struct ClientSession {
    id: SessionId,
    peer: PeerAddr,
    state: SessionState,
    control: Arc<dyn PacketChannel>,
    interrupt: Arc<dyn PacketChannel>,
}

impl ClientSession {
    /// Wraps a freshly accepted pair.
    pub fn new(pair: ConnectionPair) -> Self {
        Self {
            id: SessionId::new(),
            peer: pair.peer,
            state: SessionState::Accepted,
            control: Arc::from(pair.control),
            interrupt: Arc::from(pair.interrupt),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> PeerAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session {} ({}): {:?} -> {:?}", self.id, self.peer, self.state, next);
        self.state = next;
    }

    /// Runs the session until the host disconnects or a channel fails.
    ///
    /// Registers a queue on `bus` for the duration of the session.
    pub async fn run(mut self, bus: &ReportBus, config: &SessionConfig) -> SessionSummary {
        let (registration, queue) = bus.register(self.id, config.queue_capacity);
        self.transition(SessionState::Active);
        info!("session {} active for {}", self.id, self.peer);

        let sent = Arc::new(AtomicU64::new(0));
        let buffer_size = config.recv_buffer_size.max(1);
        let eviction = queue.eviction();
        let mut tasks = JoinSet::new();
        tasks.spawn(send_reports(queue, Arc::clone(&self.interrupt), Arc::clone(&sent)));
        tasks.spawn(async move {
            eviction.wait().await;
            SessionExit::Overflow
        });
        tasks.spawn(read_channel(
            self.id,
            ChannelKind::Control,
            Arc::clone(&self.control),
            buffer_size,
        ));
        tasks.spawn(read_channel(
            self.id,
            ChannelKind::Interrupt,
            Arc::clone(&self.interrupt),
            buffer_size,
        ));

        let exit = match tasks.join_next().await {
            Some(Ok(exit)) => exit,
            Some(Err(e)) => SessionExit::TaskFailed(e.to_string()),
            None => SessionExit::TaskFailed("no session tasks".to_string()),
        };

        self.transition(SessionState::Closing);
        tasks.shutdown().await;
        drop(registration);
        self.transition(SessionState::Closed);

        let summary = SessionSummary {
            id: self.id,
            peer: self.peer,
            exit,
            reports_sent: sent.load(Ordering::Relaxed),
        };
        info!(
            "session {} for {} closed: {} ({} reports sent)",
            summary.id, summary.peer, summary.exit, summary.reports_sent
        );
        summary
    }
}

async fn send_reports(
    mut queue: ReportQueue,
    interrupt: Arc<dyn PacketChannel>,
    sent: Arc<AtomicU64>,
) -> SessionExit {
    while let Some(report) = queue.recv().await {
        if let Err(e) = interrupt.send(report.as_bytes()).await {
            return SessionExit::SendFailed(e.kind());
        }
        sent.fetch_add(1, Ordering::Relaxed);
    }
    if queue.is_evicted() {
        SessionExit::Overflow
    } else {
        SessionExit::QueueClosed
    }
}

async fn read_channel(
    id: SessionId,
    kind: ChannelKind,
    channel: Arc<dyn PacketChannel>,
    buffer_size: usize,
) -> SessionExit {
    let mut buf = vec![0u8; buffer_size];
    loop {
        match channel.recv(&mut buf).await {
            Ok(0) => return SessionExit::PeerClosed(kind),
            Ok(n) => debug!("session {id}: {kind} <- {}", hex(&buf[..n])),
            Err(e) => return SessionExit::ReadFailed(kind, e.kind()),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
