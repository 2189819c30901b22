//! Matching of control and interrupt connections by host address.
//!
//! A host connects control first and interrupt second, but nothing stops two
//! hosts from connecting at the same time, so the halves are matched by
//! peer address rather than by arrival order.  A half that waits longer
//! than the pairing timeout is closed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ChannelKind, ConnectionPair, PacketChannel, PeerAddr};

/// Default time one half of a pair may wait for the other.
pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingHalf {
    kind: ChannelKind,
    channel: Box<dyn PacketChannel>,
    deadline: Instant,
}

/// Holds connections that are still waiting for their other half.
///
/// At most one half per host is pending at a time: the second half either
/// completes the pair or, if it is the same kind, replaces the first.
pub struct PairMatcher {
    timeout: Duration,
    pending: HashMap<PeerAddr, PendingHalf>,
}

impl PairMatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: HashMap::new(),
        }
    }

    /// Offers a freshly accepted connection.
    ///
    /// Returns the completed pair when `channel` is the missing half of a
    /// connection already pending for `peer`.
    pub fn offer(
        &mut self,
        kind: ChannelKind,
        peer: PeerAddr,
        channel: Box<dyn PacketChannel>,
        now: Instant,
    ) -> Option<ConnectionPair> {
        match self.pending.remove(&peer) {
            Some(half) if half.kind != kind => {
                debug!("{peer}: {kind} channel completes the pair");
                let (control, interrupt) = match kind {
                    ChannelKind::Control => (channel, half.channel),
                    ChannelKind::Interrupt => (half.channel, channel),
                };
                Some(ConnectionPair {
                    peer,
                    control,
                    interrupt,
                })
            }
            previous => {
                if previous.is_some() {
                    warn!("{peer}: second {kind} channel replaces the pending one");
                }
                debug!("{peer}: {kind} channel waiting for its other half");
                self.pending.insert(
                    peer,
                    PendingHalf {
                        kind,
                        channel,
                        deadline: now + self.timeout,
                    },
                );
                None
            }
        }
    }

    /// Drops every pending half whose deadline has passed.
    ///
    /// Dropping the channel closes it.  Returns how many were dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        self.pending.retain(|peer, half| {
            let keep = half.deadline > now;
            if !keep {
                warn!("{peer}: {} channel was never paired; closing", half.kind);
            }
            keep
        });
        before - self.pending.len()
    }

    /// The earliest deadline among pending halves.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|half| half.deadline).min()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for PairMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PAIRING_TIMEOUT)
    }
}
