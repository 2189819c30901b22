//! Linux evdev key code to USB HID usage ID table (page 0x07, Keyboard/Keypad).
//!
//! Reference: USB HID Usage Tables 1.3, Section 10.
//!
//! Entries above 0xE7 are the vendor-page usages that common Bluetooth HID
//! hosts accept for media keys when sent through the plain keyboard report.

use super::codes::*;

/// Translates an evdev key code to its HID usage ID.
///
/// Returns `None` if the key has no entry in the table.
pub fn evdev_to_usage(code: u16) -> Option<u8> {
    let usage = match code {
        KEY_RESERVED => 0x00,
        KEY_ESC => 0x29,
        KEY_1 => 0x1E,
        KEY_2 => 0x1F,
        KEY_3 => 0x20,
        KEY_4 => 0x21,
        KEY_5 => 0x22,
        KEY_6 => 0x23,
        KEY_7 => 0x24,
        KEY_8 => 0x25,
        KEY_9 => 0x26,
        KEY_0 => 0x27,
        KEY_MINUS => 0x2D,
        KEY_EQUAL => 0x2E,
        KEY_BACKSPACE => 0x2A,
        KEY_TAB => 0x2B,
        KEY_Q => 0x14,
        KEY_W => 0x1A,
        KEY_E => 0x08,
        KEY_R => 0x15,
        KEY_T => 0x17,
        KEY_Y => 0x1C,
        KEY_U => 0x18,
        KEY_I => 0x0C,
        KEY_O => 0x12,
        KEY_P => 0x13,
        KEY_LEFTBRACE => 0x2F,
        KEY_RIGHTBRACE => 0x30,
        KEY_ENTER => 0x28,
        KEY_LEFTCTRL => 0xE0,
        KEY_A => 0x04,
        KEY_S => 0x16,
        KEY_D => 0x07,
        KEY_F => 0x09,
        KEY_G => 0x0A,
        KEY_H => 0x0B,
        KEY_J => 0x0D,
        KEY_K => 0x0E,
        KEY_L => 0x0F,
        KEY_SEMICOLON => 0x33,
        KEY_APOSTROPHE => 0x34,
        KEY_GRAVE => 0x35,
        KEY_LEFTSHIFT => 0xE1,
        KEY_BACKSLASH => 0x32,
        KEY_Z => 0x1D,
        KEY_X => 0x1B,
        KEY_C => 0x06,
        KEY_V => 0x19,
        KEY_B => 0x05,
        KEY_N => 0x11,
        KEY_M => 0x10,
        KEY_COMMA => 0x36,
        KEY_DOT => 0x37,
        KEY_SLASH => 0x38,
        KEY_RIGHTSHIFT => 0xE5,
        KEY_KPASTERISK => 0x55,
        KEY_LEFTALT => 0xE2,
        KEY_SPACE => 0x2C,
        KEY_CAPSLOCK => 0x39,
        KEY_F1 => 0x3A,
        KEY_F2 => 0x3B,
        KEY_F3 => 0x3C,
        KEY_F4 => 0x3D,
        KEY_F5 => 0x3E,
        KEY_F6 => 0x3F,
        KEY_F7 => 0x40,
        KEY_F8 => 0x41,
        KEY_F9 => 0x42,
        KEY_F10 => 0x43,
        KEY_NUMLOCK => 0x53,
        KEY_SCROLLLOCK => 0x47,
        KEY_KP7 => 0x5F,
        KEY_KP8 => 0x60,
        KEY_KP9 => 0x61,
        KEY_KPMINUS => 0x56,
        KEY_KP4 => 0x5C,
        KEY_KP5 => 0x5D,
        KEY_KP6 => 0x5E,
        KEY_KPPLUS => 0x57,
        KEY_KP1 => 0x59,
        KEY_KP2 => 0x5A,
        KEY_KP3 => 0x5B,
        KEY_KP0 => 0x62,
        KEY_KPDOT => 0x63,
        KEY_ZENKAKUHANKAKU => 0x94,
        KEY_102ND => 0x64,
        KEY_F11 => 0x44,
        KEY_F12 => 0x45,
        KEY_RO => 0x87,
        KEY_KATAKANA => 0x92,
        KEY_HIRAGANA => 0x93,
        KEY_HENKAN => 0x8A,
        KEY_KATAKANAHIRAGANA => 0x88,
        KEY_MUHENKAN => 0x8B,
        KEY_KPJPCOMMA => 0x8C,
        KEY_KPENTER => 0x58,
        KEY_RIGHTCTRL => 0xE4,
        KEY_KPSLASH => 0x54,
        KEY_SYSRQ => 0x46,
        KEY_RIGHTALT => 0xE6,
        KEY_HOME => 0x4A,
        KEY_UP => 0x52,
        KEY_PAGEUP => 0x4B,
        KEY_LEFT => 0x50,
        KEY_RIGHT => 0x4F,
        KEY_END => 0x4D,
        KEY_DOWN => 0x51,
        KEY_PAGEDOWN => 0x4E,
        KEY_INSERT => 0x49,
        KEY_DELETE => 0x4C,
        KEY_MUTE => 0xEF,
        KEY_VOLUMEDOWN => 0xEE,
        KEY_VOLUMEUP => 0xED,
        KEY_POWER => 0x66,
        KEY_KPEQUAL => 0x67,
        KEY_PAUSE => 0x48,
        KEY_KPCOMMA => 0x85,
        KEY_HANGEUL => 0x90,
        KEY_HANJA => 0x91,
        KEY_YEN => 0x89,
        KEY_LEFTMETA => 0xE3,
        KEY_RIGHTMETA => 0xE7,
        KEY_COMPOSE => 0x65,
        KEY_STOP => 0xF3,
        KEY_AGAIN => 0x79,
        KEY_PROPS => 0x76,
        KEY_UNDO => 0x7A,
        KEY_FRONT => 0x77,
        KEY_COPY => 0x7C,
        KEY_OPEN => 0x74,
        KEY_PASTE => 0x7D,
        KEY_FIND => 0xF4,
        KEY_CUT => 0x7B,
        KEY_HELP => 0x75,
        KEY_CALC => 0xFB,
        KEY_SLEEP => 0xF8,
        KEY_WWW => 0xF0,
        KEY_COFFEE => 0xF9,
        KEY_BACK => 0xF1,
        KEY_FORWARD => 0xF2,
        KEY_EJECTCD => 0xEC,
        KEY_NEXTSONG => 0xEB,
        KEY_PLAYPAUSE => 0xE8,
        KEY_PREVIOUSSONG => 0xEA,
        KEY_STOPCD => 0xE9,
        KEY_REFRESH => 0xFA,
        KEY_EDIT => 0xF7,
        KEY_SCROLLUP => 0xF5,
        KEY_SCROLLDOWN => 0xF6,
        KEY_F13 => 0x68,
        KEY_F14 => 0x69,
        KEY_F15 => 0x6A,
        KEY_F16 => 0x6B,
        KEY_F17 => 0x6C,
        KEY_F18 => 0x6D,
        KEY_F19 => 0x6E,
        KEY_F20 => 0x6F,
        KEY_F21 => 0x70,
        KEY_F22 => 0x71,
        KEY_F23 => 0x72,
        KEY_F24 => 0x73,
        _ => return None,
    };
    Some(usage)
}
