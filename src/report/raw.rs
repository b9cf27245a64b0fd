//! Raw payloads, exactly as a platform source hands them over, and the rules that decide
//! whether a combination of action flags is acceptable.

use smallvec::SmallVec;

use super::{InputType, ReportError};
use crate::{axis::StylusPoint, keyboard::VirtualKey, util::Point, StylusDeviceId, TabletId};

bitflags::bitflags! {
    /// What happened to the keyboard.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct RawKeyboardActions: u32 {
        const ATTRIBUTES_CHANGED = 0x01;
        const ACTIVATE = 0x02;
        const DEACTIVATE = 0x04;
        const KEY_DOWN = 0x08;
        const KEY_UP = 0x10;
    }
}
impl RawKeyboardActions {
    /// Whether this is an acceptable combination.
    ///
    /// Rejects unknown bits and `KEY_DOWN | KEY_UP`. The deactivate clause rejects any set that
    /// is a subset of `DEACTIVATE` without being equal to it, which only ever matches the empty
    /// set. Deactivate combined with other actions is accepted.
    #[must_use]
    pub fn is_valid(self) -> bool {
        if !Self::all().contains(self) {
            return false;
        }
        let down_and_up = self.contains(Self::KEY_DOWN | Self::KEY_UP);
        let deactivate_clause = Self::DEACTIVATE.contains(self) && self != Self::DEACTIVATE;
        !(down_and_up || deactivate_clause)
    }
}

/// See [`InputReport::keyboard`](super::InputReport::keyboard).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawKeyboardInput {
    pub actions: RawKeyboardActions,
    pub scan_code: u16,
    pub is_extended_key: bool,
    pub is_system_key: bool,
    pub virtual_key: VirtualKey,
    /// Opaque value the platform attached to the message.
    pub extra_information: isize,
}

bitflags::bitflags! {
    /// What happened to the mouse.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct RawMouseActions: u32 {
        const ATTRIBUTES_CHANGED = 0x0000_0001;
        const ACTIVATE = 0x0000_0002;
        const DEACTIVATE = 0x0000_0004;
        const RELATIVE_MOVE = 0x0000_0008;
        const ABSOLUTE_MOVE = 0x0000_0010;
        const VIRTUAL_DESKTOP_MOVE = 0x0000_0020;
        const BUTTON1_PRESS = 0x0000_0040;
        const BUTTON1_RELEASE = 0x0000_0080;
        const BUTTON2_PRESS = 0x0000_0100;
        const BUTTON2_RELEASE = 0x0000_0200;
        const BUTTON3_PRESS = 0x0000_0400;
        const BUTTON3_RELEASE = 0x0000_0800;
        const BUTTON4_PRESS = 0x0000_1000;
        const BUTTON4_RELEASE = 0x0000_2000;
        const BUTTON5_PRESS = 0x0000_4000;
        const BUTTON5_RELEASE = 0x0000_8000;
        const VERTICAL_WHEEL_ROTATE = 0x0001_0000;
        const HORIZONTAL_WHEEL_ROTATE = 0x0002_0000;
        const QUERY_CURSOR = 0x0004_0000;
        const CANCEL_CAPTURE = 0x0008_0000;
    }
}
impl RawMouseActions {
    /// Press/release pairs, in button order.
    pub const BUTTONS: [(Self, Self); 5] = [
        (Self::BUTTON1_PRESS, Self::BUTTON1_RELEASE),
        (Self::BUTTON2_PRESS, Self::BUTTON2_RELEASE),
        (Self::BUTTON3_PRESS, Self::BUTTON3_RELEASE),
        (Self::BUTTON4_PRESS, Self::BUTTON4_RELEASE),
        (Self::BUTTON5_PRESS, Self::BUTTON5_RELEASE),
    ];
    pub const ANY_MOVE: Self = Self::RELATIVE_MOVE
        .union(Self::ABSOLUTE_MOVE)
        .union(Self::VIRTUAL_DESKTOP_MOVE);
    /// Whether this is an acceptable combination. The empty set is valid; otherwise all bits
    /// must be known, `DEACTIVATE` must stand alone, and no button may be pressed and released
    /// at once.
    #[must_use]
    pub fn is_valid(self) -> bool {
        if self.is_empty() {
            return true;
        }
        if !Self::all().contains(self) {
            return false;
        }
        if self.contains(Self::DEACTIVATE) && self != Self::DEACTIVATE {
            return false;
        }
        !Self::BUTTONS
            .iter()
            .any(|&(press, release)| self.contains(press | release))
    }
}

/// See [`InputReport::mouse`](super::InputReport::mouse).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawMouseInput {
    pub actions: RawMouseActions,
    pub position: Point,
    /// Wheel rotation in platform units, positive away from the user.
    pub wheel: i32,
    pub extra_information: isize,
}

bitflags::bitflags! {
    /// What a stylus did. A report carries exactly one of these.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct RawStylusActions: u16 {
        const ACTIVATE = 0x001;
        const DEACTIVATE = 0x002;
        const DOWN = 0x004;
        const UP = 0x008;
        const MOVE = 0x010;
        const IN_AIR_MOVE = 0x020;
        const IN_RANGE = 0x040;
        const OUT_OF_RANGE = 0x080;
        const SYSTEM_GESTURE = 0x100;
    }
}
impl RawStylusActions {
    #[must_use]
    pub fn is_valid(self) -> bool {
        Self::all().contains(self) && self.bits().count_ones() == 1
    }
}

/// See [`InputReport::stylus`](super::InputReport::stylus).
#[derive(Clone, Debug, PartialEq)]
pub struct RawStylusInput {
    pub actions: RawStylusActions,
    pub tablet: TabletId,
    pub stylus: StylusDeviceId,
    /// The eraser end is in use.
    pub inverted: bool,
    /// Oldest first. The last point is the stylus' current position.
    pub points: SmallVec<[StylusPoint; 4]>,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct RawTextFlags: u8 {
        /// A dead key that combines with the next character.
        const DEAD = 0x1;
        /// Produced while the system (alt) modifier was held.
        const SYSTEM = 0x2;
        const CONTROL = 0x4;
    }
}

/// See [`InputReport::text`](super::InputReport::text).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawTextInput {
    pub character: char,
    pub flags: RawTextFlags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::FromRepr, strum::AsRefStr)]
#[repr(u8)]
pub enum RawUiStateAction {
    Set = 1,
    Clear = 2,
    Initialize = 3,
}
impl RawUiStateAction {
    /// # Errors
    /// Fails if `raw` is not one of the known actions.
    pub fn try_from_raw(raw: u8) -> Result<Self, ReportError> {
        Self::from_repr(raw).ok_or(ReportError::InvalidUiStateAction(raw))
    }
}

bitflags::bitflags! {
    /// Keyboard-cue visibility state of a window.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct RawUiStateTargets: u8 {
        const HIDE_FOCUS = 0x1;
        const HIDE_ACCELERATORS = 0x2;
        const ACTIVE = 0x4;
    }
}
impl RawUiStateTargets {
    #[must_use]
    pub fn is_valid(self) -> bool {
        Self::all().contains(self)
    }
    /// Apply `action` with these targets to the `current` state.
    #[must_use]
    pub fn apply(self, action: RawUiStateAction, current: Self) -> Self {
        match action {
            RawUiStateAction::Set => current | self,
            RawUiStateAction::Clear => current - self,
            RawUiStateAction::Initialize => self,
        }
    }
}

/// See [`InputReport::ui_state`](super::InputReport::ui_state).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawUiStateInput {
    pub action: RawUiStateAction,
    pub targets: RawUiStateTargets,
}

/// A platform application command, such as the browser-back button on a keyboard or mouse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawAppCommandInput {
    pub command: i32,
    pub device: InputType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_actions_truth_table() {
        type A = RawKeyboardActions;
        assert!(!(A::KEY_DOWN | A::KEY_UP).is_valid());
        assert!((A::KEY_DOWN | A::ATTRIBUTES_CHANGED).is_valid());
        assert!(A::DEACTIVATE.is_valid());
        // The deactivate clause only rejects the empty set.
        assert!(!A::empty().is_valid());
        assert!((A::DEACTIVATE | A::KEY_DOWN).is_valid());
        assert!(!A::from_bits_retain(0x20).is_valid());
        assert!(!(A::KEY_DOWN | A::from_bits_retain(0x100)).is_valid());
    }

    #[test]
    fn mouse_actions_rules() {
        type A = RawMouseActions;
        assert!(A::empty().is_valid());
        assert!((A::ABSOLUTE_MOVE | A::BUTTON1_PRESS).is_valid());
        assert!(!(A::BUTTON3_PRESS | A::BUTTON3_RELEASE).is_valid());
        assert!((A::BUTTON1_PRESS | A::BUTTON2_RELEASE).is_valid());
        assert!(!(A::DEACTIVATE | A::ABSOLUTE_MOVE).is_valid());
        assert!(!A::from_bits_retain(0x0010_0000).is_valid());
    }

    #[test]
    fn stylus_actions_are_single() {
        assert!(RawStylusActions::DOWN.is_valid());
        assert!(!RawStylusActions::empty().is_valid());
        assert!(!(RawStylusActions::DOWN | RawStylusActions::MOVE).is_valid());
    }

    #[test]
    fn ui_state_application() {
        type T = RawUiStateTargets;
        let current = T::HIDE_FOCUS;
        assert_eq!(
            T::HIDE_ACCELERATORS.apply(RawUiStateAction::Set, current),
            T::HIDE_FOCUS | T::HIDE_ACCELERATORS
        );
        assert_eq!(T::HIDE_FOCUS.apply(RawUiStateAction::Clear, current), T::empty());
        assert_eq!(T::ACTIVE.apply(RawUiStateAction::Initialize, current), T::ACTIVE);
        assert_eq!(RawUiStateAction::try_from_raw(0), Err(ReportError::InvalidUiStateAction(0)));
        assert!(!T::from_bits_retain(0x8).is_valid());
    }
}
