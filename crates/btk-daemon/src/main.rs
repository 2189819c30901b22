//! btkd: Bluetooth HID keyboard/mouse daemon, entry point.
//!
//! Reads keyboard and mouse events from local evdev devices and sends them
//! as HID input reports to every host connected over Bluetooth Classic, so
//! this machine looks like a wireless keyboard and mouse to them.
//!
//! # Usage
//!
//! ```text
//! btkd [OPTIONS] [DEVICES]...
//!
//! Arguments:
//!   [DEVICES]...            evdev device nodes to read [default: all keyboards and pointers]
//!
//! Options:
//!   -c, --config <PATH>     Configuration file [env: BTKD_CONFIG]
//!       --grab              Grab devices exclusively
//!       --log-level <LEVEL> Log filter when RUST_LOG is unset
//!       --print-config      Print the effective configuration and exit
//! ```
//!
//! The daemon must run as root (or with `CAP_NET_ADMIN` and read access to
//! `/dev/input`), and BlueZ's `input` plugin must be disabled so PSM 17 and
//! 19 are free.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use btk_daemon::infrastructure::storage::config::{load_config, DaemonConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bluetooth HID keyboard and mouse daemon.
#[derive(Debug, Parser)]
#[command(
    name = "btkd",
    about = "Present this machine as a Bluetooth keyboard and mouse",
    version
)]
struct Cli {
    /// evdev device nodes to read, e.g. /dev/input/event3.
    ///
    /// When omitted, the configured devices are used; when none are
    /// configured either, every keyboard and pointer is opened.
    #[arg(value_name = "DEVICES")]
    devices: Vec<PathBuf>,

    /// Configuration file.  Defaults to /etc/btkd/config.toml when present.
    #[arg(short, long, env = "BTKD_CONFIG")]
    config: Option<PathBuf>,

    /// Grab the devices exclusively so the local desktop stops receiving
    /// their input.
    #[arg(long)]
    grab: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "debug").
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Loads the configuration file and applies command-line overrides.
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let mut config = load_config(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("failed to load configuration from {}", path.display()),
            None => "failed to load configuration".to_string(),
        })?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(self, config: &mut DaemonConfig) {
        if !self.devices.is_empty() {
            config.input.devices = self.devices;
        }
        if self.grab {
            config.input.grab = true;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let print_config = cli.print_config;
    let config = cli.into_config()?;

    if print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("btkd {} starting", env!("CARGO_PKG_VERSION"));
    run(config).await?;
    info!("btkd stopped");
    Ok(())
}

#[cfg(target_os = "linux")]
async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    use btk_daemon::application::serve::Orchestrator;
    use btk_daemon::infrastructure::input_capture::evdev::discover_sources;
    use btk_daemon::infrastructure::profile::bluez::BluezRegistrar;
    use btk_daemon::infrastructure::profile::HidProfile;
    use btk_daemon::infrastructure::transport::l2cap::L2capTransport;

    let profile = HidProfile::from_config(&config.profile)?;
    let sources = discover_sources(&config.input.devices, config.input.grab)
        .context("failed to open input devices")?;
    info!("reading {} input device(s)", sources.len());

    let registrar = BluezRegistrar::new();
    let transport = L2capTransport::new();
    Orchestrator::new(&registrar, &transport, config.serve_config())
        .run(&profile, sources, shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: DaemonConfig) -> anyhow::Result<()> {
    anyhow::bail!("btkd needs Linux: BlueZ and evdev are not available on this platform")
}

/// Resolves on Ctrl+C or SIGTERM.
#[cfg(target_os = "linux")]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            None
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("received Ctrl+C; shutting down"),
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
                std::future::pending::<()>().await;
            }
        },
        Some(()) = async {
            match terminate.as_mut() {
                Some(stream) => stream.recv().await,
                None => std::future::pending().await,
            }
        } => info!("received SIGTERM; shutting down"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
