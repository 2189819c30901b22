//! Infrastructure layer of the daemon.
//!
//! OS-facing adapters: L2CAP sockets, evdev devices, BlueZ profile
//! registration and the configuration file.  Every adapter sits behind a
//! trait with an in-memory mock so the application layer can be tested
//! without a Bluetooth controller or input hardware.
//!
//! **Dependency rule**: `application` sees this layer only through its
//! traits and plain data types, never through a concrete adapter.

pub mod input_capture;
pub mod profile;
pub mod storage;
pub mod transport;
