//! evdev device nodes as input sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use btk_core::InputEvent;
use evdev::{Device, EventStream, EventType};
use tracing::{debug, info, warn};

use super::{CaptureError, InputSource};

/// One opened `/dev/input/event*` device.
pub struct EvdevSource {
    name: String,
    stream: EventStream,
}

impl EvdevSource {
    /// Opens `path`, grabbing it exclusively when `grab` is set.
    pub fn open(path: &Path, grab: bool) -> Result<Self, CaptureError> {
        let device = Device::open(path).map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_device(path, device, grab)
    }

    fn from_device(path: &Path, mut device: Device, grab: bool) -> Result<Self, CaptureError> {
        let name = format!(
            "{} ({})",
            device.name().unwrap_or("unnamed device"),
            path.display()
        );
        if grab {
            device.grab().map_err(|source| CaptureError::Grab {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let stream = device.into_event_stream().map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!("capturing input from {name}{}", if grab { " (grabbed)" } else { "" });
        Ok(Self { name, stream })
    }
}

#[async_trait]
impl InputSource for EvdevSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<InputEvent>, CaptureError> {
        loop {
            let raw = self.stream.next_event().await.map_err(|source| CaptureError::Read {
                name: self.name.clone(),
                source,
            })?;
            if let Some(event) = InputEvent::from_raw(raw.event_type().0, raw.code(), raw.value()) {
                return Ok(Some(event));
            }
        }
    }
}

fn is_keyboard_or_pointer(device: &Device) -> bool {
    let events = device.supported_events();
    events.contains(EventType::KEY) || events.contains(EventType::RELATIVE)
}

/// Opens the configured devices, or every keyboard and pointer when the
/// list is empty.
///
/// An explicitly named device that cannot be opened is an error.  During
/// discovery, devices that fail to open or grab are skipped with a warning.
pub fn discover_sources(
    paths: &[PathBuf],
    grab: bool,
) -> Result<Vec<Box<dyn InputSource>>, CaptureError> {
    let mut sources: Vec<Box<dyn InputSource>> = Vec::new();

    if !paths.is_empty() {
        for path in paths {
            sources.push(Box::new(EvdevSource::open(path, grab)?));
        }
        return Ok(sources);
    }

    for (path, device) in evdev::enumerate() {
        if !is_keyboard_or_pointer(&device) {
            debug!("skipping {}: no keys or relative axes", path.display());
            continue;
        }
        match EvdevSource::from_device(&path, device, grab) {
            Ok(source) => sources.push(Box::new(source)),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }

    if sources.is_empty() {
        return Err(CaptureError::NoDevices);
    }
    Ok(sources)
}
