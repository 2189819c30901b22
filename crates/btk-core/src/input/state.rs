//! InputState: the event-to-report translation state machine.
//!
//! Holds the modifiers, non-modifier keys and pointer buttons that are
//! currently down.  Every state-changing event yields a report that is a
//! snapshot of the *entire* current state, never a delta, so a host that
//! misses a report recovers on the next one.
//!
//! # Key ordering
//!
//! Held keys are kept in press order.  A keyboard report has six key slots;
//! when more than six keys are held, the six earliest-pressed keys that are
//! still held are reported.  Releasing one of them lets the next key move up.
//!
//! # Inconsistent release events
//!
//! A release for a key or button that is not held means the device stream and
//! our state disagree (for example, the key was already down when the daemon
//! started).  This is logged and the report is still emitted, which
//! resynchronises the remote host with what we believe is held.

use thiserror::Error;
use tracing::{debug, warn};

use super::event::{Axis, InputEvent};
use crate::keymap::{KeyClass, KeyMap, KeySymbol, KeyUsage, PointerButton};
use crate::report::{KeyboardReport, PointerReport, Report, KEY_SLOTS};

/// Error type for event translation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// The key is in neither the usage table nor the modifier table.
    #[error("{0} is not in the key or modifier table")]
    UnknownKeySymbol(KeySymbol),
}

/// Currently held input state of the virtual keyboard/mouse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputState {
    modifiers: u8,
    keys: Vec<KeyUsage>,
    buttons: u8,
}

impl InputState {
    /// Creates a state with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded event and returns the report it produces.
    ///
    /// Unknown key symbols are skipped (logged at `debug`) and produce no
    /// report.
    pub fn apply(&mut self, event: InputEvent) -> Option<Report> {
        match event {
            InputEvent::Key { symbol, pressed } => match self.key_transition(symbol, pressed) {
                Ok(report) => Some(report.into()),
                Err(e) => {
                    debug!("skipping event: {e}");
                    None
                }
            },
            InputEvent::Button { button, pressed } => {
                Some(self.button_transition(button, pressed).into())
            }
            InputEvent::Motion { axis, delta } => Some(self.motion(axis, delta).into()),
        }
    }

    /// Records a key press or release and returns the resulting keyboard report.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::UnknownKeySymbol`] if `symbol` cannot be
    /// represented; the state is left unchanged.
    pub fn key_transition(
        &mut self,
        symbol: KeySymbol,
        pressed: bool,
    ) -> Result<KeyboardReport, TranslateError> {
        match KeyMap::classify(symbol).ok_or(TranslateError::UnknownKeySymbol(symbol))? {
            KeyClass::Modifier(modifier) => {
                let bit = modifier.bit();
                if !pressed && self.modifiers & bit == 0 {
                    warn!("release of {modifier:?} which was not held; resynchronising");
                }
                if pressed {
                    self.modifiers |= bit;
                } else {
                    self.modifiers &= !bit;
                }
            }
            KeyClass::Key(usage) => {
                let position = self.keys.iter().position(|k| *k == usage);
                match (pressed, position) {
                    (true, None) => self.keys.push(usage),
                    (true, Some(_)) => {}
                    (false, Some(i)) => {
                        self.keys.remove(i);
                    }
                    (false, None) => {
                        warn!("release of {symbol} which was not held; resynchronising");
                    }
                }
            }
        }
        Ok(self.keyboard_report())
    }

    /// Records a button press or release and returns a pointer report with no motion.
    pub fn button_transition(&mut self, button: PointerButton, pressed: bool) -> PointerReport {
        let bit = button.bit();
        if !pressed && self.buttons & bit == 0 {
            warn!("release of {button:?} button which was not held; resynchronising");
        }
        if pressed {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
        self.pointer_report(0, 0, 0)
    }

    /// Returns a pointer report moving `delta` along `axis` with the held buttons.
    pub fn motion(&self, axis: Axis, delta: i32) -> PointerReport {
        match axis {
            Axis::X => self.pointer_report(delta, 0, 0),
            Axis::Y => self.pointer_report(0, delta, 0),
            Axis::Wheel => self.pointer_report(0, 0, delta),
        }
    }

    /// Snapshot of the keyboard half of the state.
    pub fn keyboard_report(&self) -> KeyboardReport {
        let usages: Vec<u8> = self.keys.iter().take(KEY_SLOTS).map(|k| k.0).collect();
        KeyboardReport::new(self.modifiers, &usages)
    }

    fn pointer_report(&self, dx: i32, dy: i32, wheel: i32) -> PointerReport {
        PointerReport::new(self.buttons, dx, dy, wheel)
    }

    /// Releases everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bitmask of held modifiers.
    pub fn modifiers(&self) -> u8 {
        self.modifiers
    }

    /// Held non-modifier keys in press order.
    pub fn held_keys(&self) -> &[KeyUsage] {
        &self.keys
    }

    /// Bitmask of held pointer buttons.
    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// `true` when no key, modifier or button is held.
    pub fn is_idle(&self) -> bool {
        self.modifiers == 0 && self.keys.is_empty() && self.buttons == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::codes::*;

    fn press(state: &mut InputState, code: u16) -> KeyboardReport {
        state.key_transition(KeySymbol(code), true).unwrap()
    }

    fn release(state: &mut InputState, code: u16) -> KeyboardReport {
        state.key_transition(KeySymbol(code), false).unwrap()
    }

    // ── Keyboard ──────────────────────────────────────────────────────────────

    #[test]
    fn test_press_key_a_emits_usage_in_first_slot() {
        // Arrange
        let mut state = InputState::new();

        // Act
        let report = press(&mut state, KEY_A);

        // Assert
        assert_eq!(
            report.as_bytes(),
            &[0xA1, 0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_shift_then_a_sets_modifier_bit() {
        // Arrange
        let mut state = InputState::new();
        press(&mut state, KEY_LEFTSHIFT);

        // Act
        let report = press(&mut state, KEY_A);

        // Assert
        assert_eq!(
            report.as_bytes(),
            &[0xA1, 0x01, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_modifier_press_does_not_occupy_key_slot() {
        let mut state = InputState::new();
        let report = press(&mut state, KEY_RIGHTCTRL);
        assert_eq!(report.modifiers(), 0x10);
        assert_eq!(report.keys(), &[0; 6]);
        assert!(state.held_keys().is_empty());
    }

    #[test]
    fn test_press_release_round_trip_restores_state() {
        // Arrange
        let mut state = InputState::new();
        press(&mut state, KEY_LEFTALT);
        press(&mut state, KEY_Q);
        let before = state.clone();

        // Act
        for code in [KEY_W, KEY_LEFTSHIFT, KEY_F5] {
            press(&mut state, code);
            release(&mut state, code);
        }

        // Assert
        assert_eq!(state, before);
    }

    #[test]
    fn test_duplicate_press_is_idempotent() {
        let mut state = InputState::new();
        press(&mut state, KEY_A);
        let report = press(&mut state, KEY_A);
        assert_eq!(state.held_keys(), &[KeyUsage(0x04)]);
        assert_eq!(report.keys(), &[0x04, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_keys_are_reported_in_press_order() {
        // Arrange
        let mut state = InputState::new();

        // Act – press in a non-sorted order
        press(&mut state, KEY_Z);
        press(&mut state, KEY_A);
        let report = press(&mut state, KEY_M);

        // Assert
        assert_eq!(report.keys(), &[0x1D, 0x04, 0x10, 0, 0, 0]);
    }

    #[test]
    fn test_more_than_six_keys_reports_six_earliest() {
        // Arrange
        let mut state = InputState::new();
        let codes = [KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8];

        // Act
        let mut report = None;
        for code in codes {
            report = Some(press(&mut state, code));
        }
        let report = report.unwrap();

        // Assert
        assert_eq!(report.keys(), &[0x1E, 0x1F, 0x20, 0x21, 0x22, 0x23]);
        assert_eq!(state.held_keys().len(), 8);
    }

    #[test]
    fn test_releasing_reported_key_promotes_next_held_key() {
        // Arrange
        let mut state = InputState::new();
        for code in [KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7] {
            press(&mut state, code);
        }

        // Act
        let report = release(&mut state, KEY_2);

        // Assert
        assert_eq!(report.keys(), &[0x1E, 0x20, 0x21, 0x22, 0x23, 0x24]);
    }

    #[test]
    fn test_truncation_is_repeatable() {
        let run = || {
            let mut state = InputState::new();
            let mut last = None;
            for code in [KEY_Q, KEY_W, KEY_E, KEY_R, KEY_T, KEY_Y, KEY_U, KEY_I] {
                last = Some(press(&mut state, code));
            }
            last.unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_unknown_symbol_is_rejected_without_state_change() {
        // Arrange
        let mut state = InputState::new();
        press(&mut state, KEY_A);
        let before = state.clone();

        // Act
        let result = state.key_transition(KeySymbol(0x2F0), true);

        // Assert
        assert_eq!(result, Err(TranslateError::UnknownKeySymbol(KeySymbol(0x2F0))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_release_of_unheld_key_still_emits_snapshot() {
        // Arrange
        let mut state = InputState::new();
        press(&mut state, KEY_B);

        // Act
        let report = release(&mut state, KEY_C);

        // Assert – B is still reported, nothing else changed
        assert_eq!(report.keys(), &[0x05, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_release_of_unheld_modifier_leaves_mask_clear() {
        let mut state = InputState::new();
        let report = release(&mut state, KEY_LEFTMETA);
        assert_eq!(report.modifiers(), 0);
    }

    // ── Pointer ───────────────────────────────────────────────────────────────

    #[test]
    fn test_left_button_then_move_x() {
        // Arrange
        let mut state = InputState::new();
        state.button_transition(PointerButton::Left, true);

        // Act
        let report = state.motion(Axis::X, 5);

        // Assert
        assert_eq!(report.as_bytes(), &[0xA1, 0x02, 0x01, 0x05, 0x00, 0x00]);
    }

    #[test]
    fn test_button_transition_has_zero_motion() {
        let mut state = InputState::new();
        let report = state.button_transition(PointerButton::Middle, true);
        assert_eq!(report.as_bytes(), &[0xA1, 0x02, 0x04, 0x00, 0x00, 0x00]);
        let report = state.button_transition(PointerButton::Middle, false);
        assert_eq!(report.as_bytes(), &[0xA1, 0x02, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_motion_sets_only_requested_axis() {
        let state = InputState::new();
        assert_eq!(state.motion(Axis::Y, -2).as_bytes()[3..], [0x00, 0xFE, 0x00]);
        assert_eq!(state.motion(Axis::Wheel, 1).as_bytes()[3..], [0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_multiple_buttons_combine() {
        let mut state = InputState::new();
        state.button_transition(PointerButton::Left, true);
        let report = state.button_transition(PointerButton::Right, true);
        assert_eq!(report.buttons(), 0x03);
    }

    #[test]
    fn test_release_of_unheld_button_still_emits_snapshot() {
        // Arrange
        let mut state = InputState::new();
        state.button_transition(PointerButton::Left, true);

        // Act
        let report = state.button_transition(PointerButton::Right, false);

        // Assert – left is still held, no motion, nothing else changed
        assert_eq!(report.as_bytes(), &[0xA1, 0x02, 0x01, 0x00, 0x00, 0x00]);
        assert!(!state.is_idle());
    }

    // ── apply / reset ─────────────────────────────────────────────────────────

    #[test]
    fn test_apply_skips_unknown_key() {
        let mut state = InputState::new();
        let event = InputEvent::Key { symbol: KeySymbol(0x2F0), pressed: true };
        assert_eq!(state.apply(event), None);
    }

    #[test]
    fn test_apply_routes_each_event_kind() {
        let mut state = InputState::new();
        assert!(matches!(
            state.apply(InputEvent::Key { symbol: KeySymbol(KEY_ENTER), pressed: true }),
            Some(Report::Keyboard(_))
        ));
        assert!(matches!(
            state.apply(InputEvent::Button { button: PointerButton::Left, pressed: true }),
            Some(Report::Pointer(_))
        ));
        assert!(matches!(
            state.apply(InputEvent::Motion { axis: Axis::X, delta: 1 }),
            Some(Report::Pointer(_))
        ));
    }

    #[test]
    fn test_reset_releases_everything() {
        let mut state = InputState::new();
        press(&mut state, KEY_LEFTCTRL);
        press(&mut state, KEY_C);
        state.button_transition(PointerButton::Left, true);

        state.reset();

        assert!(state.is_idle());
        assert_eq!(state.keyboard_report().as_bytes()[2..], [0; 8]);
    }
}
