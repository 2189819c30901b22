//! TOML-based configuration for the daemon.
//!
//! The file is looked up at `--config` / `BTKD_CONFIG`, falling back to
//! `/etc/btkd/config.toml`.  Every key is optional; a missing file means
//! "all defaults", which is what most installations use.
//!
//! ```toml
//! log_level = "info"
//!
//! [profile]
//! name = "/btk/profile"
//! # service_record = "/etc/btkd/sdp_record.xml"
//!
//! [transport]
//! control_psm = 17
//! interrupt_psm = 19
//! pairing_timeout_ms = 5000
//!
//! [session]
//! queue_capacity = 256
//! overflow_policy = "disconnect"   # or "drop_oldest"
//! recv_buffer_size = 64
//!
//! [input]
//! devices = ["/dev/input/event3"]
//! grab = false
//! event_buffer = 1024
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so older or partial files keep
//! working.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::report_bus::OverflowPolicy;
use crate::application::serve::ServeConfig;
use crate::application::session::SessionConfig;

/// Config file used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/btkd/config.toml";

/// Profile object name used when none is configured.
pub const DEFAULT_PROFILE_NAME: &str = "/btk/profile";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub input: InputConfig,
}

/// How the HID service is published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    #[serde(default = "default_profile_name")]
    pub name: String,
    /// SDP record file replacing the bundled one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_record: Option<PathBuf>,
    #[serde(default)]
    pub require_authentication: bool,
    #[serde(default)]
    pub require_authorization: bool,
}

/// L2CAP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    #[serde(default = "default_control_psm")]
    pub control_psm: u16,
    #[serde(default = "default_interrupt_psm")]
    pub interrupt_psm: u16,
    /// How long an accepted channel waits for its partner, in milliseconds.
    #[serde(default = "default_pairing_timeout_ms")]
    pub pairing_timeout_ms: u64,
}

/// Per-session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Reports buffered per session before the overflow policy applies.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

/// Input device settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Device nodes to read.  Empty means every keyboard and pointer.
    #[serde(default)]
    pub devices: Vec<PathBuf>,
    /// Grab devices exclusively so the local session stops seeing input.
    #[serde(default)]
    pub grab: bool,
    /// Capacity of the channel between device pumps and the dispatcher.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_profile_name() -> String {
    DEFAULT_PROFILE_NAME.to_string()
}
fn default_control_psm() -> u16 {
    0x11
}
fn default_interrupt_psm() -> u16 {
    0x13
}
fn default_pairing_timeout_ms() -> u64 {
    5000
}
fn default_queue_capacity() -> usize {
    256
}
fn default_recv_buffer_size() -> usize {
    64
}
fn default_event_buffer() -> usize {
    1024
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            profile: ProfileConfig::default(),
            transport: TransportConfig::default(),
            session: SessionSection::default(),
            input: InputConfig::default(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            service_record: None,
            require_authentication: false,
            require_authorization: false,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            control_psm: default_control_psm(),
            interrupt_psm: default_interrupt_psm(),
            pairing_timeout_ms: default_pairing_timeout_ms(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow_policy: OverflowPolicy::default(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            grab: false,
            event_buffer: default_event_buffer(),
        }
    }
}

impl DaemonConfig {
    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Runtime settings for the server.
    pub fn serve_config(&self) -> ServeConfig {
        ServeConfig {
            control_psm: self.transport.control_psm,
            interrupt_psm: self.transport.interrupt_psm,
            pairing_timeout: Duration::from_millis(self.transport.pairing_timeout_ms),
            session: SessionConfig {
                queue_capacity: self.session.queue_capacity,
                recv_buffer_size: self.session.recv_buffer_size,
            },
            overflow_policy: self.session.overflow_policy,
            event_buffer: self.input.event_buffer,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses a configuration from TOML text.
pub fn parse_config(content: &str) -> Result<DaemonConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads the configuration.
///
/// An explicit `path` must exist.  Without one, [`DEFAULT_CONFIG_PATH`] is
/// read if present and defaults are used otherwise.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<DaemonConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };

    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            Ok(DaemonConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
