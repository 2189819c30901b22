//! Decoded input events.

use crate::keymap::{codes, KeyMap, KeySymbol, PointerButton};

/// Relative motion axis carried by the pointer report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Wheel,
}

/// An input event relevant to the virtual keyboard/mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A keyboard key went down (`pressed = true`) or up.
    Key { symbol: KeySymbol, pressed: bool },
    /// A pointer button went down or up.
    Button { button: PointerButton, pressed: bool },
    /// Relative movement on one axis.
    Motion { axis: Axis, delta: i32 },
}

impl InputEvent {
    /// Decodes a raw evdev `(type, code, value)` triple.
    ///
    /// Returns `None` for everything the virtual device does not model:
    /// sync/misc/absolute events, unsupported relative axes, and key
    /// auto-repeat (`value == 2`).
    pub fn from_raw(event_type: u16, code: u16, value: i32) -> Option<Self> {
        match event_type {
            codes::EV_KEY => {
                let pressed = match value {
                    0 => false,
                    1 => true,
                    _ => return None,
                };
                match KeyMap::button(code) {
                    Some(button) => Some(InputEvent::Button { button, pressed }),
                    None => Some(InputEvent::Key {
                        symbol: KeySymbol(code),
                        pressed,
                    }),
                }
            }
            codes::EV_REL => {
                let axis = match code {
                    codes::REL_X => Axis::X,
                    codes::REL_Y => Axis::Y,
                    codes::REL_WHEEL => Axis::Wheel,
                    _ => return None,
                };
                Some(InputEvent::Motion { axis, delta: value })
            }
            _ => None,
        }
    }
}
