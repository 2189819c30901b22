//! Key translation tables for the evdev → HID boundary.
//!
//! Device events identify keys by Linux evdev key code.  On the wire a key is
//! either a bit in the modifier byte or a USB HID usage ID in one of the six
//! key slots.  [`KeyMap`] answers which of the two a key is.

pub mod codes;
pub mod usage;

use std::fmt;

/// A device key symbol: the Linux evdev key code reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySymbol(pub u16);

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key {}", self.0)
    }
}

/// A USB HID usage ID on the Keyboard/Keypad page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyUsage(pub u8);

/// One of the eight keys carried in the modifier byte.
///
/// The discriminant is the key's bit in that byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Modifier {
    LeftCtrl = 0b0000_0001,
    LeftShift = 0b0000_0010,
    LeftAlt = 0b0000_0100,
    LeftMeta = 0b0000_1000,
    RightCtrl = 0b0001_0000,
    RightShift = 0b0010_0000,
    RightAlt = 0b0100_0000,
    RightMeta = 0b1000_0000,
}

impl Modifier {
    /// Bit assigned to this modifier in the keyboard report.
    pub fn bit(self) -> u8 {
        self as u8
    }
}

/// Pointer buttons carried in the pointer report's button byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PointerButton {
    Left = 0b0000_0001,
    Right = 0b0000_0010,
    Middle = 0b0000_0100,
}

impl PointerButton {
    /// Bit assigned to this button in the pointer report.
    pub fn bit(self) -> u8 {
        self as u8
    }
}

/// How a key symbol is represented in the keyboard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Modifier(Modifier),
    Key(KeyUsage),
}

/// Static lookup tables, consumed read-only.
pub struct KeyMap;

impl KeyMap {
    /// Classifies `symbol`; the modifier table is consulted first.
    ///
    /// Returns `None` if the symbol is in neither table.
    pub fn classify(symbol: KeySymbol) -> Option<KeyClass> {
        if let Some(modifier) = Self::modifier(symbol) {
            return Some(KeyClass::Modifier(modifier));
        }
        Self::usage(symbol).map(KeyClass::Key)
    }

    /// Looks up the modifier bit for `symbol`.
    pub fn modifier(symbol: KeySymbol) -> Option<Modifier> {
        match symbol.0 {
            codes::KEY_LEFTCTRL => Some(Modifier::LeftCtrl),
            codes::KEY_LEFTSHIFT => Some(Modifier::LeftShift),
            codes::KEY_LEFTALT => Some(Modifier::LeftAlt),
            codes::KEY_LEFTMETA => Some(Modifier::LeftMeta),
            codes::KEY_RIGHTCTRL => Some(Modifier::RightCtrl),
            codes::KEY_RIGHTSHIFT => Some(Modifier::RightShift),
            codes::KEY_RIGHTALT => Some(Modifier::RightAlt),
            codes::KEY_RIGHTMETA => Some(Modifier::RightMeta),
            _ => None,
        }
    }

    /// Looks up the HID usage ID for `symbol`.
    pub fn usage(symbol: KeySymbol) -> Option<KeyUsage> {
        usage::evdev_to_usage(symbol.0).map(KeyUsage)
    }

    /// Maps an evdev button code to a pointer button.
    ///
    /// Only the three buttons the pointer report carries are recognised.
    pub fn button(code: u16) -> Option<PointerButton> {
        match code {
            codes::BTN_LEFT => Some(PointerButton::Left),
            codes::BTN_RIGHT => Some(PointerButton::Right),
            codes::BTN_MIDDLE => Some(PointerButton::Middle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefers_modifier_table() {
        // LEFTSHIFT also has a usage (0xE1) but must be routed as a modifier.
        assert_eq!(
            KeyMap::classify(KeySymbol(codes::KEY_LEFTSHIFT)),
            Some(KeyClass::Modifier(Modifier::LeftShift))
        );
    }

    #[test]
    fn test_classify_plain_key() {
        assert_eq!(
            KeyMap::classify(KeySymbol(codes::KEY_A)),
            Some(KeyClass::Key(KeyUsage(0x04)))
        );
    }

    #[test]
    fn test_classify_unknown_symbol() {
        assert_eq!(KeyMap::classify(KeySymbol(0x2F0)), None);
    }

    #[test]
    fn test_modifier_bits_are_distinct() {
        let all = [
            Modifier::LeftCtrl,
            Modifier::LeftShift,
            Modifier::LeftAlt,
            Modifier::LeftMeta,
            Modifier::RightCtrl,
            Modifier::RightShift,
            Modifier::RightAlt,
            Modifier::RightMeta,
        ];
        let combined = all.iter().fold(0u8, |acc, m| {
            assert_eq!(acc & m.bit(), 0, "{m:?} overlaps another modifier");
            acc | m.bit()
        });
        assert_eq!(combined, 0xFF);
    }

    #[test]
    fn test_button_table_covers_three_buttons() {
        assert_eq!(KeyMap::button(codes::BTN_LEFT), Some(PointerButton::Left));
        assert_eq!(KeyMap::button(codes::BTN_RIGHT), Some(PointerButton::Right));
        assert_eq!(KeyMap::button(codes::BTN_MIDDLE), Some(PointerButton::Middle));
        // BTN_SIDE
        assert_eq!(KeyMap::button(0x113), None);
    }
}
