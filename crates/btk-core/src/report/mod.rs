//! HID report wire format.
//!
//! Every report starts with the HIDP transaction header `0xA1` (DATA, input)
//! followed by the report ID declared in the SDP record's HID descriptor.
//!
//! ```text
//! Keyboard (10 bytes):  A1 01 <mods> 00 <k0> <k1> <k2> <k3> <k4> <k5>
//! Pointer  (6 bytes):   A1 02 <buttons> <dx> <dy> <wheel>
//! ```
//!
//! Motion fields are signed 8-bit two's complement; larger deltas are
//! truncated to their low byte.

/// HIDP header: transaction type DATA, parameter INPUT.
pub const HIDP_DATA_INPUT: u8 = 0xA1;
/// Report ID of the keyboard collection.
pub const KEYBOARD_REPORT_ID: u8 = 0x01;
/// Report ID of the mouse collection.
pub const POINTER_REPORT_ID: u8 = 0x02;
/// Number of simultaneous non-modifier keys a keyboard report carries.
pub const KEY_SLOTS: usize = 6;

pub const KEYBOARD_REPORT_LEN: usize = 10;
pub const POINTER_REPORT_LEN: usize = 6;

/// A 10-byte keyboard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport([u8; KEYBOARD_REPORT_LEN]);

impl KeyboardReport {
    /// Builds a report from a modifier byte and up to [`KEY_SLOTS`] usages.
    ///
    /// Usages beyond the sixth are ignored; unused slots are zero.
    pub fn new(modifiers: u8, usages: &[u8]) -> Self {
        let mut bytes = [0u8; KEYBOARD_REPORT_LEN];
        bytes[0] = HIDP_DATA_INPUT;
        bytes[1] = KEYBOARD_REPORT_ID;
        bytes[2] = modifiers;
        for (slot, usage) in bytes[4..].iter_mut().zip(usages) {
            *slot = *usage;
        }
        Self(bytes)
    }

    pub fn modifiers(&self) -> u8 {
        self.0[2]
    }

    pub fn keys(&self) -> &[u8] {
        &self.0[4..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A 6-byte pointer report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerReport([u8; POINTER_REPORT_LEN]);

impl PointerReport {
    /// Builds a report; each delta is masked to its low 8 bits.
    pub fn new(buttons: u8, dx: i32, dy: i32, wheel: i32) -> Self {
        Self([
            HIDP_DATA_INPUT,
            POINTER_REPORT_ID,
            buttons,
            low_byte(dx),
            low_byte(dy),
            low_byte(wheel),
        ])
    }

    pub fn buttons(&self) -> u8 {
        self.0[2]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A report produced by [`crate::InputState`], ready for the interrupt channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Keyboard(KeyboardReport),
    Pointer(PointerReport),
}

impl Report {
    /// Wire bytes, written verbatim to the interrupt channel.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Report::Keyboard(r) => r.as_bytes(),
            Report::Pointer(r) => r.as_bytes(),
        }
    }
}

impl From<KeyboardReport> for Report {
    fn from(r: KeyboardReport) -> Self {
        Report::Keyboard(r)
    }
}

impl From<PointerReport> for Report {
    fn from(r: PointerReport) -> Self {
        Report::Pointer(r)
    }
}

fn low_byte(delta: i32) -> u8 {
    (delta & 0xFF) as u8
}
