//! Storage infrastructure: the daemon configuration file.
//!
//! The `config` sub-module reads the TOML file, fills in defaults for every
//! missing key, and renders the effective configuration back to TOML for
//! `--print-config`.

pub mod config;
