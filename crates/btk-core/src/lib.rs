//! # btk-core
//!
//! Domain library for btk: the input translation state machine, the HID
//! report wire format, and the static key translation tables.
//!
//! This crate has zero dependencies on OS APIs, Bluetooth stacks or sockets.
//! The daemon (`btk-daemon`) feeds it decoded input events and ships the
//! reports it produces.
//!
//! # Architecture overview
//!
//! btk makes a Linux machine look like a Bluetooth keyboard and mouse.  Every
//! key press, button click or mouse movement observed on a local input device
//! is folded into a single [`InputState`], which answers with a fixed-layout
//! HID report describing the *whole* current state of the virtual device.
//!
//! - **`keymap`** – Static tables mapping Linux evdev key codes to USB HID
//!   usage IDs and modifier bits, plus pointer button bits.
//!
//! - **`input`** – The decoded [`InputEvent`] type and the [`InputState`]
//!   state machine that turns events into reports.
//!
//! - **`report`** – The two wire payloads: the 10-byte keyboard report and the
//!   6-byte pointer report.

pub mod input;
pub mod keymap;
pub mod report;

pub use input::event::{Axis, InputEvent};
pub use input::state::{InputState, TranslateError};
pub use keymap::{KeyClass, KeyMap, KeySymbol, KeyUsage, Modifier, PointerButton};
pub use report::{KeyboardReport, PointerReport, Report};
