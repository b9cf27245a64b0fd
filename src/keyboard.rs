//! # Keyboard
//!
//! [`KeyboardDevice`] is the authority on which keys are down, which are toggled, and which
//! element has keyboard focus. Its picture is built from the keyboard reports it promotes, and
//! can be reconciled against the OS at any time through [`SystemInputState`].

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    events::{KeyEventArgs, RoutedEvent},
    report::{InputReport, RawKeyboardActions, RawKeyboardInput},
    system::SystemInputState,
    ElementId, SourceId,
};

/// A platform virtual key code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualKey(pub u16);
impl VirtualKey {
    pub const BACK: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const ENTER: Self = Self(0x0D);
    pub const SHIFT: Self = Self(0x10);
    pub const CONTROL: Self = Self(0x11);
    pub const ALT: Self = Self(0x12);
    pub const CAPS_LOCK: Self = Self(0x14);
    pub const ESCAPE: Self = Self(0x1B);
    pub const SPACE: Self = Self(0x20);
    pub const LEFT: Self = Self(0x25);
    pub const UP: Self = Self(0x26);
    pub const RIGHT: Self = Self(0x27);
    pub const DOWN: Self = Self(0x28);
    pub const DELETE: Self = Self(0x2E);
    pub const A: Self = Self(0x41);
    pub const C: Self = Self(0x43);
    pub const S: Self = Self(0x53);
    pub const V: Self = Self(0x56);
    pub const X: Self = Self(0x58);
    pub const Z: Self = Self(0x5A);
    pub const LEFT_WINDOWS: Self = Self(0x5B);
    pub const RIGHT_WINDOWS: Self = Self(0x5C);
    pub const F1: Self = Self(0x70);
    pub const NUM_LOCK: Self = Self(0x90);
    pub const SCROLL_LOCK: Self = Self(0x91);
    pub const LEFT_SHIFT: Self = Self(0xA0);
    pub const RIGHT_SHIFT: Self = Self(0xA1);
    pub const LEFT_CONTROL: Self = Self(0xA2);
    pub const RIGHT_CONTROL: Self = Self(0xA3);
    pub const LEFT_ALT: Self = Self(0xA4);
    pub const RIGHT_ALT: Self = Self(0xA5);

    /// Keys whose state decides [`ModifierKeys`], with the modifier each one holds.
    const MODIFIERS: [(Self, ModifierKeys); 11] = [
        (Self::SHIFT, ModifierKeys::SHIFT),
        (Self::LEFT_SHIFT, ModifierKeys::SHIFT),
        (Self::RIGHT_SHIFT, ModifierKeys::SHIFT),
        (Self::CONTROL, ModifierKeys::CONTROL),
        (Self::LEFT_CONTROL, ModifierKeys::CONTROL),
        (Self::RIGHT_CONTROL, ModifierKeys::CONTROL),
        (Self::ALT, ModifierKeys::ALT),
        (Self::LEFT_ALT, ModifierKeys::ALT),
        (Self::RIGHT_ALT, ModifierKeys::ALT),
        (Self::LEFT_WINDOWS, ModifierKeys::WINDOWS),
        (Self::RIGHT_WINDOWS, ModifierKeys::WINDOWS),
    ];
    const LOCKS: [Self; 3] = [Self::CAPS_LOCK, Self::NUM_LOCK, Self::SCROLL_LOCK];

    /// The key for an ASCII letter or digit, which share their virtual key with the uppercase
    /// character.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        let c = c.to_ascii_uppercase();
        (c.is_ascii_uppercase() || c.is_ascii_digit()).then(|| Self(u16::from(c as u8)))
    }
    /// The modifier this key holds while down, if any.
    #[must_use]
    pub fn modifier(self) -> Option<ModifierKeys> {
        Self::MODIFIERS
            .iter()
            .find_map(|&(key, modifier)| (key == self).then_some(modifier))
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct KeyStates: u8 {
        const DOWN = 0x1;
        /// Flips on every fresh press. Meaningful for lock keys.
        const TOGGLED = 0x2;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct ModifierKeys: u8 {
        const ALT = 0x1;
        const CONTROL = 0x2;
        const SHIFT = 0x4;
        const WINDOWS = 0x8;
    }
}

/// See [module level docs](`crate::keyboard`) for details.
#[derive(Debug, Default)]
pub struct KeyboardDevice {
    active_source: Option<SourceId>,
    focused: Option<ElementId>,
    states: HashMap<VirtualKey, KeyStates>,
}

/// # Queries
impl KeyboardDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// The source currently delivering keyboard input, if the keyboard is active.
    #[must_use]
    pub fn active_source(&self) -> Option<SourceId> {
        self.active_source
    }
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_source.is_some()
    }
    #[must_use]
    pub fn focused_element(&self) -> Option<ElementId> {
        self.focused
    }
    /// State of `key` as of the last promoted report or reconciliation.
    #[must_use]
    pub fn key_states(&self, key: VirtualKey) -> KeyStates {
        self.states.get(&key).copied().unwrap_or_default()
    }
    #[must_use]
    pub fn is_key_down(&self, key: VirtualKey) -> bool {
        self.key_states(key).contains(KeyStates::DOWN)
    }
    #[must_use]
    pub fn is_key_toggled(&self, key: VirtualKey) -> bool {
        self.key_states(key).contains(KeyStates::TOGGLED)
    }
    #[must_use]
    pub fn modifiers(&self) -> ModifierKeys {
        VirtualKey::MODIFIERS
            .iter()
            .filter(|(key, _)| self.is_key_down(*key))
            .fold(ModifierKeys::empty(), |held, (_, modifier)| held | *modifier)
    }
    /// Live state of `key`, bypassing the cache entirely.
    #[must_use]
    pub fn key_states_from_system(
        &self,
        system: &dyn SystemInputState,
        key: VirtualKey,
    ) -> KeyStates {
        system.key_states(key)
    }
}

/// # State changes
impl KeyboardDevice {
    /// Returns the previously focused element.
    pub(crate) fn set_focus(&mut self, focus: Option<ElementId>) -> Option<ElementId> {
        std::mem::replace(&mut self.focused, focus)
    }
    /// Refresh cached state of every key seen so far, plus modifiers and locks, from the OS.
    pub fn reconcile(&mut self, system: &dyn SystemInputState) {
        let keys: Vec<VirtualKey> = self
            .states
            .keys()
            .copied()
            .chain(VirtualKey::MODIFIERS.iter().map(|(key, _)| *key))
            .chain(VirtualKey::LOCKS)
            .collect();
        for key in keys {
            let states = system.key_states(key);
            if states.is_empty() {
                self.states.remove(&key);
            } else {
                self.states.insert(key, states);
            }
        }
        trace!(keys = self.states.len(), "keyboard reconciled");
    }
    /// Apply a keyboard report, returning the typed events to raise on the focused element.
    pub(crate) fn promote(
        &mut self,
        report: &InputReport,
        raw: &RawKeyboardInput,
        system: &dyn SystemInputState,
    ) -> SmallVec<[KeyEventArgs; 1]> {
        let mut promoted = SmallVec::new();
        if raw.actions.contains(RawKeyboardActions::ACTIVATE) {
            debug!(source = ?report.source(), "keyboard activated");
            self.active_source = Some(report.source());
            self.reconcile(system);
        }
        if raw
            .actions
            .intersects(RawKeyboardActions::KEY_DOWN | RawKeyboardActions::KEY_UP)
            && !self.is_active()
        {
            // Key traffic implies the source is active even if the activation was missed.
            self.active_source = Some(report.source());
        }
        let key = raw.virtual_key;
        if raw.actions.contains(RawKeyboardActions::KEY_DOWN) {
            let previous = self.key_states(key);
            let is_repeat = previous.contains(KeyStates::DOWN);
            let mut states = previous | KeyStates::DOWN;
            if !is_repeat {
                states.toggle(KeyStates::TOGGLED);
            }
            self.states.insert(key, states);
            if let Some(args) = self.key_args(RoutedEvent::KeyDown, report, raw, is_repeat) {
                promoted.push(args);
            }
        }
        if raw.actions.contains(RawKeyboardActions::KEY_UP) {
            let states = self.key_states(key) - KeyStates::DOWN;
            if states.is_empty() {
                self.states.remove(&key);
            } else {
                self.states.insert(key, states);
            }
            if let Some(args) = self.key_args(RoutedEvent::KeyUp, report, raw, false) {
                promoted.push(args);
            }
        }
        if raw.actions.contains(RawKeyboardActions::DEACTIVATE) {
            debug!(source = ?report.source(), "keyboard deactivated");
            self.active_source = None;
            // Keys released elsewhere would otherwise look stuck. Toggles survive.
            self.states.retain(|_, states| {
                states.remove(KeyStates::DOWN);
                !states.is_empty()
            });
        }
        promoted
    }
    fn key_args(
        &self,
        event: RoutedEvent,
        report: &InputReport,
        raw: &RawKeyboardInput,
        is_repeat: bool,
    ) -> Option<KeyEventArgs> {
        let target = self.focused?;
        let mut args = KeyEventArgs::new(event, target, report.timestamp(), raw.virtual_key);
        args.scan_code = raw.scan_code;
        args.is_extended_key = raw.is_extended_key;
        args.is_system_key = raw.is_system_key;
        args.is_repeat = is_repeat;
        args.key_states = self.key_states(raw.virtual_key);
        args.modifiers = self.modifiers();
        Some(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::InputArgs,
        report::{InputMode, Timestamp},
        system::SnapshotState,
    };

    fn keyboard_report(
        actions: RawKeyboardActions,
        key: VirtualKey,
    ) -> (InputReport, RawKeyboardInput) {
        let raw = RawKeyboardInput {
            actions,
            virtual_key: key,
            ..RawKeyboardInput::default()
        };
        let report = InputReport::keyboard(
            SourceId::new(1),
            InputMode::Foreground,
            Timestamp::default(),
            raw,
        )
        .unwrap();
        (report, raw)
    }

    #[test]
    fn repeat_and_toggle() {
        let system = SnapshotState::new();
        let mut keyboard = KeyboardDevice::new();
        keyboard.set_focus(Some(ElementId::new(5)));

        let (report, raw) = keyboard_report(RawKeyboardActions::KEY_DOWN, VirtualKey::CAPS_LOCK);
        let first = keyboard.promote(&report, &raw, &system);
        assert!(!first[0].is_repeat);
        assert!(keyboard.is_key_toggled(VirtualKey::CAPS_LOCK));
        let second = keyboard.promote(&report, &raw, &system);
        assert!(second[0].is_repeat);
        assert!(keyboard.is_key_toggled(VirtualKey::CAPS_LOCK));

        let (report, raw) = keyboard_report(RawKeyboardActions::KEY_UP, VirtualKey::CAPS_LOCK);
        let up = keyboard.promote(&report, &raw, &system);
        assert_eq!(up[0].routed_event(), RoutedEvent::KeyUp);
        assert_eq!(keyboard.key_states(VirtualKey::CAPS_LOCK), KeyStates::TOGGLED);
    }

    #[test]
    fn modifiers_follow_either_side() {
        let system = SnapshotState::new();
        let mut keyboard = KeyboardDevice::new();
        let (report, raw) =
            keyboard_report(RawKeyboardActions::KEY_DOWN, VirtualKey::RIGHT_CONTROL);
        // Nothing focused, so no events, but state still tracks.
        assert!(keyboard.promote(&report, &raw, &system).is_empty());
        assert_eq!(keyboard.modifiers(), ModifierKeys::CONTROL);
    }

    #[test]
    fn activation_reconciles_and_deactivation_releases() {
        let system = SnapshotState::new();
        system.set_key(VirtualKey::SHIFT, KeyStates::DOWN);
        system.set_key(VirtualKey::NUM_LOCK, KeyStates::TOGGLED);
        let mut keyboard = KeyboardDevice::new();

        let (report, raw) = keyboard_report(RawKeyboardActions::ACTIVATE, VirtualKey::default());
        keyboard.promote(&report, &raw, &system);
        assert!(keyboard.is_active());
        assert!(keyboard.is_key_down(VirtualKey::SHIFT));
        assert!(keyboard.is_key_toggled(VirtualKey::NUM_LOCK));

        let (report, raw) = keyboard_report(RawKeyboardActions::DEACTIVATE, VirtualKey::default());
        keyboard.promote(&report, &raw, &system);
        assert!(!keyboard.is_active());
        assert!(!keyboard.is_key_down(VirtualKey::SHIFT));
        assert!(keyboard.is_key_toggled(VirtualKey::NUM_LOCK));
        // The live state is untouched by the cache.
        assert_eq!(keyboard.key_states_from_system(&system, VirtualKey::SHIFT), KeyStates::DOWN);
    }

    #[test]
    fn letters_map_to_keys() {
        assert_eq!(VirtualKey::from_char('a'), Some(VirtualKey::A));
        assert_eq!(VirtualKey::from_char('?'), None);
        assert_eq!(VirtualKey::LEFT_ALT.modifier(), Some(ModifierKeys::ALT));
    }
}
