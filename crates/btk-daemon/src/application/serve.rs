//! The orchestrator: wires profile, listeners, input and sessions together.
//!
//! Startup is all-or-nothing: the HID profile is registered and both L2CAP
//! listeners are bound before any input is read, and a failure in either
//! step aborts with a [`StartupError`].  After that the server runs until
//! the shutdown future resolves, accepting one session per connection pair.
//!
//! # Shutdown order
//!
//! 1. Stop accepting.
//! 2. Abort all sessions (channels closed, queues deregistered).
//! 3. Abort input pumps and the dispatcher.
//! 4. Drop the profile guard, which unregisters the profile.

use std::future::Future;
use std::io;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::dispatch::{pump_source, run_dispatcher};
use crate::application::report_bus::{OverflowPolicy, ReportBus};
use crate::application::session::{ClientSession, SessionConfig};
use crate::infrastructure::input_capture::InputSource;
use crate::infrastructure::profile::{HidProfile, ProfileError, ProfileRegistrar};
use crate::infrastructure::transport::listener::HidListener;
use crate::infrastructure::transport::pairing::DEFAULT_PAIRING_TIMEOUT;
use crate::infrastructure::transport::{Transport, HID_CONTROL_PSM, HID_INTERRUPT_PSM};

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("failed to bind L2CAP psm {psm}: {source}")]
    Bind {
        psm: u16,
        #[source]
        source: io::Error,
    },
}

/// Runtime settings for [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub control_psm: u16,
    pub interrupt_psm: u16,
    pub pairing_timeout: Duration,
    pub session: SessionConfig,
    pub overflow_policy: OverflowPolicy,
    /// Capacity of the pump-to-dispatcher channel.
    pub event_buffer: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            control_psm: HID_CONTROL_PSM,
            interrupt_psm: HID_INTERRUPT_PSM,
            pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
            session: SessionConfig::default(),
            overflow_policy: OverflowPolicy::default(),
            event_buffer: 1024,
        }
    }
}

/// Runs the peripheral from startup to shutdown.
pub struct Orchestrator<'a> {
    registrar: &'a dyn ProfileRegistrar,
    transport: &'a dyn Transport,
    config: ServeConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registrar: &'a dyn ProfileRegistrar,
        transport: &'a dyn Transport,
        config: ServeConfig,
    ) -> Self {
        Self {
            registrar,
            transport,
            config,
        }
    }

    /// Serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the profile cannot be registered or a
    /// listener cannot be bound.  Once serving, errors are handled per
    /// session or per source and never end the server.
    pub async fn run(
        self,
        profile: &HidProfile,
        sources: Vec<Box<dyn InputSource>>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), StartupError> {
        let config = self.config;

        let profile_guard = self.registrar.register(profile).await?;

        let control = self.transport.bind(config.control_psm).await.map_err(|source| {
            StartupError::Bind {
                psm: config.control_psm,
                source,
            }
        })?;
        let interrupt = self.transport.bind(config.interrupt_psm).await.map_err(|source| {
            StartupError::Bind {
                psm: config.interrupt_psm,
                source,
            }
        })?;
        info!(
            "listening for HID hosts on psm {} (control) and {} (interrupt)",
            config.control_psm, config.interrupt_psm
        );

        let bus = ReportBus::new(config.overflow_policy);
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));

        let mut background = JoinSet::new();
        for source in sources {
            background.spawn(pump_source(source, events_tx.clone()));
        }
        drop(events_tx);
        background.spawn({
            let bus = bus.clone();
            async move {
                run_dispatcher(events_rx, bus).await;
            }
        });

        let incoming = HidListener::new(control, interrupt, config.pairing_timeout).incoming();
        tokio::pin!(incoming);
        tokio::pin!(shutdown);

        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                next = incoming.next() => match next {
                    Some(Ok(pair)) => {
                        let session = ClientSession::new(pair);
                        info!("host {} connected (session {})", session.peer(), session.id());
                        let bus = bus.clone();
                        let session_config = config.session.clone();
                        sessions.spawn(async move { session.run(&bus, &session_config).await });
                    }
                    Some(Err(e)) => warn!("accept failed: {e}"),
                    None => break,
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            warn!("session task failed: {e}");
                        }
                    }
                    debug!("{} session(s) active", bus.len());
                }
            }
        }

        sessions.shutdown().await;
        background.shutdown().await;
        drop(profile_guard);
        info!("HID profile unregistered; server stopped");
        Ok(())
    }
}
