//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`InputEvent`]s without an evdev
//! device.  The source ends cleanly once every [`MockInputHandle`] is
//! dropped or closed.

use std::io;

use async_trait::async_trait;
use btk_core::InputEvent;
use tokio::sync::mpsc;

use super::{CaptureError, InputSource};

type Item = Result<InputEvent, io::Error>;

/// A mock implementation of [`InputSource`] fed through a handle.
pub struct MockInputSource {
    name: String,
    rx: mpsc::UnboundedReceiver<Item>,
}

/// Test-side handle of a [`MockInputSource`].
#[derive(Clone)]
pub struct MockInputHandle {
    tx: mpsc::UnboundedSender<Item>,
}

impl MockInputSource {
    /// Creates a new mock input source and its handle.
    pub fn new(name: impl Into<String>) -> (Self, MockInputHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                rx,
            },
            MockInputHandle { tx },
        )
    }
}

impl MockInputHandle {
    /// Injects a synthetic event, as if read from a device.
    ///
    /// Returns `false` if the source has already been dropped.
    pub fn inject(&self, event: InputEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// Makes the source fail with a read error of `kind`, as when a device
    /// is unplugged.
    pub fn fail(&self, kind: io::ErrorKind) -> bool {
        self.tx
            .send(Err(io::Error::new(kind, "injected read failure")))
            .is_ok()
    }

    /// Ends the source once queued events are consumed.
    pub fn close(self) {}
}

#[async_trait]
impl InputSource for MockInputSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<InputEvent>, CaptureError> {
        match self.rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(source)) => Err(CaptureError::Read {
                name: self.name.clone(),
                source,
            }),
            None => Ok(None),
        }
    }
}
