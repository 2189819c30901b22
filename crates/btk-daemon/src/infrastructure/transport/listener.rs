//! Accepting HID connection pairs.
//!
//! [`HidListener`] owns the control and interrupt listeners and a
//! [`PairMatcher`].  Each call to [`HidListener::accept_pair`] accepts on
//! whichever listener is ready, closes halves whose pairing deadline passed,
//! and returns as soon as one host has both channels open.

use std::io;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::time::{self, Instant};
use tracing::info;

use super::pairing::PairMatcher;
use super::{ChannelKind, ChannelListener, ConnectionPair};

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(200);

/// Control plus interrupt listener producing matched pairs.
pub struct HidListener {
    control: Box<dyn ChannelListener>,
    interrupt: Box<dyn ChannelListener>,
    matcher: PairMatcher,
}

impl HidListener {
    pub fn new(
        control: Box<dyn ChannelListener>,
        interrupt: Box<dyn ChannelListener>,
        pairing_timeout: Duration,
    ) -> Self {
        Self {
            control,
            interrupt,
            matcher: PairMatcher::new(pairing_timeout),
        }
    }

    /// Waits until some host has opened both channels.
    ///
    /// An accept error is returned to the caller; pending halves are kept.
    /// Cancel-safe: a connection accepted before cancellation stays pending.
    pub async fn accept_pair(&mut self) -> io::Result<ConnectionPair> {
        loop {
            let deadline = self.matcher.next_deadline();
            let (kind, accepted) = tokio::select! {
                res = self.control.accept() => (ChannelKind::Control, res),
                res = self.interrupt.accept() => (ChannelKind::Interrupt, res),
                _ = sleep_until_opt(deadline) => {
                    self.matcher.expire(Instant::now());
                    continue;
                }
            };

            let (channel, peer) = accepted?;
            info!("{peer}: {kind} channel accepted");
            if let Some(pair) = self.matcher.offer(kind, peer, channel, Instant::now()) {
                return Ok(pair);
            }
        }
    }

    /// Turns the listener into an endless stream of pairs and accept errors.
    ///
    /// After an error the next accept waits [`ACCEPT_BACKOFF`] first.  The
    /// wait is part of polling the stream, so dropping the pending `next()`
    /// cancels it.
    pub fn incoming(self) -> impl Stream<Item = io::Result<ConnectionPair>> + Send {
        stream::unfold((self, false), |(mut listener, failed)| async move {
            if failed {
                time::sleep(ACCEPT_BACKOFF).await;
            }
            let next = listener.accept_pair().await;
            let failed = next.is_err();
            Some((next, (listener, failed)))
        })
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
