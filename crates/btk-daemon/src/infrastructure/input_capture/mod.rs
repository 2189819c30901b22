//! Input capture: where key and pointer events come from.
//!
//! On Linux each source is one evdev device node (`/dev/input/event*`),
//! read asynchronously and optionally grabbed so the local desktop stops
//! seeing its events.  Raw `(type, code, value)` triples are decoded with
//! [`InputEvent::from_raw`]; synchronisation frames, auto-repeat and
//! unsupported axes never leave the source.
//!
//! # Testability
//!
//! The [`InputSource`] trait lets tests feed synthetic events through
//! [`mock::MockInputSource`] instead of real devices.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use btk_core::InputEvent;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod evdev;

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open input device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to grab input device {path}: {source}")]
    Grab {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read from {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("no keyboard or pointer devices found")]
    NoDevices,
}

/// A stream of decoded input events from one device.
#[async_trait]
pub trait InputSource: Send {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Waits for the next relevant event.
    ///
    /// `Ok(None)` means the source ended cleanly.
    async fn next_event(&mut self) -> Result<Option<InputEvent>, CaptureError>;
}
