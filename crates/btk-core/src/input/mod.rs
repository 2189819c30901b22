//! Input events and the translation state machine.
//!
//! - **`event`** – [`event::InputEvent`], the decoded form of a raw evdev
//!   `(type, code, value)` triple.
//! - **`state`** – [`state::InputState`], which folds events into the held
//!   key/button sets and produces a report after every state change.

pub mod event;
pub mod state;
