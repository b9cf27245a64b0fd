use smallvec::SmallVec;

use super::{ArgsHeader, InputDevice, RoutedEvent};
use crate::{
    axis::StylusPoint,
    keyboard::{KeyStates, ModifierKeys, VirtualKey},
    mouse::{MouseButton, MouseButtonState},
    report::{InputReport, InputType, RawTextFlags, ReportPayload, Timestamp},
    util::Point,
    ElementId, StylusDeviceId, TabletId,
};

/// A raw report travelling the pipeline before any device has promoted it.
#[derive(Clone, Debug, PartialEq)]
pub struct InputReportEventArgs {
    pub(crate) header: ArgsHeader,
    report: InputReport,
}
impl InputReportEventArgs {
    #[must_use]
    pub fn new(report: InputReport) -> Self {
        let device = match (report.input_type(), report.payload()) {
            (_, ReportPayload::Stylus(stylus)) => Some(InputDevice::Stylus(stylus.stylus)),
            (InputType::Keyboard, _) => Some(InputDevice::Keyboard),
            (InputType::Mouse, _) => Some(InputDevice::Mouse),
            (InputType::Text, _) => Some(InputDevice::Text),
            _ => None,
        };
        Self {
            header: ArgsHeader::new(RoutedEvent::InputReport, device, report.timestamp(), None),
            report,
        }
    }
    #[must_use]
    pub fn report(&self) -> &InputReport {
        &self.report
    }
}

/// `KeyDown` or `KeyUp`.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyEventArgs {
    pub(crate) header: ArgsHeader,
    pub key: VirtualKey,
    pub scan_code: u16,
    pub is_extended_key: bool,
    pub is_system_key: bool,
    /// The key was already down when this `KeyDown` arrived.
    pub is_repeat: bool,
    /// State of `key` after this event was applied.
    pub key_states: KeyStates,
    /// Modifiers held when the event was promoted.
    pub modifiers: ModifierKeys,
}
impl KeyEventArgs {
    #[must_use]
    pub fn new(
        routed_event: RoutedEvent,
        target: ElementId,
        timestamp: Timestamp,
        key: VirtualKey,
    ) -> Self {
        Self {
            header: ArgsHeader::new(
                routed_event,
                Some(InputDevice::Keyboard),
                timestamp,
                Some(target),
            ),
            key,
            scan_code: 0,
            is_extended_key: false,
            is_system_key: false,
            is_repeat: false,
            key_states: KeyStates::empty(),
            modifiers: ModifierKeys::empty(),
        }
    }
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.key_states.contains(KeyStates::DOWN)
    }
}

/// `GotKeyboardFocus` or `LostKeyboardFocus`, raised on the new and old element respectively.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardFocusChangedEventArgs {
    pub(crate) header: ArgsHeader,
    pub old_focus: Option<ElementId>,
    pub new_focus: Option<ElementId>,
}
impl KeyboardFocusChangedEventArgs {
    #[must_use]
    pub fn new(
        routed_event: RoutedEvent,
        target: ElementId,
        timestamp: Timestamp,
        old_focus: Option<ElementId>,
        new_focus: Option<ElementId>,
    ) -> Self {
        Self {
            header: ArgsHeader::new(
                routed_event,
                Some(InputDevice::Keyboard),
                timestamp,
                Some(target),
            ),
            old_focus,
            new_focus,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextCompositionEventArgs {
    pub(crate) header: ArgsHeader,
    pub text: String,
    pub flags: RawTextFlags,
}
impl TextCompositionEventArgs {
    #[must_use]
    pub fn new(target: ElementId, timestamp: Timestamp, text: String, flags: RawTextFlags) -> Self {
        Self {
            header: ArgsHeader::new(
                RoutedEvent::TextInput,
                Some(InputDevice::Text),
                timestamp,
                Some(target),
            ),
            text,
            flags,
        }
    }
}

/// `MouseMove` or `LostMouseCapture`.
#[derive(Clone, Debug, PartialEq)]
pub struct MouseEventArgs {
    pub(crate) header: ArgsHeader,
    pub position: Point,
}
impl MouseEventArgs {
    #[must_use]
    pub fn new(
        routed_event: RoutedEvent,
        target: ElementId,
        timestamp: Timestamp,
        position: Point,
    ) -> Self {
        Self {
            header: ArgsHeader::new(
                routed_event,
                Some(InputDevice::Mouse),
                timestamp,
                Some(target),
            ),
            position,
        }
    }
}

/// `MouseDown` or `MouseUp`.
#[derive(Clone, Debug, PartialEq)]
pub struct MouseButtonEventArgs {
    pub(crate) header: ArgsHeader,
    pub position: Point,
    pub button: MouseButton,
    pub state: MouseButtonState,
    /// 1 for a single click, 2 for a double click, and so on. Zero on release.
    pub click_count: u32,
}
impl MouseButtonEventArgs {
    #[must_use]
    pub fn new(
        target: ElementId,
        timestamp: Timestamp,
        position: Point,
        button: MouseButton,
        state: MouseButtonState,
        click_count: u32,
    ) -> Self {
        let routed_event = match state {
            MouseButtonState::Pressed => RoutedEvent::MouseDown,
            MouseButtonState::Released => RoutedEvent::MouseUp,
        };
        Self {
            header: ArgsHeader::new(
                routed_event,
                Some(InputDevice::Mouse),
                timestamp,
                Some(target),
            ),
            position,
            button,
            state,
            click_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MouseWheelEventArgs {
    pub(crate) header: ArgsHeader,
    pub position: Point,
    pub delta: i32,
    pub horizontal: bool,
}
impl MouseWheelEventArgs {
    #[must_use]
    pub fn new(
        target: ElementId,
        timestamp: Timestamp,
        position: Point,
        delta: i32,
        horizontal: bool,
    ) -> Self {
        Self {
            header: ArgsHeader::new(
                RoutedEvent::MouseWheel,
                Some(InputDevice::Mouse),
                timestamp,
                Some(target),
            ),
            position,
            delta,
            horizontal,
        }
    }
}

/// Any of the stylus events. The routed event tells which.
#[derive(Clone, Debug, PartialEq)]
pub struct StylusEventArgs {
    pub(crate) header: ArgsHeader,
    pub stylus: StylusDeviceId,
    pub tablet: TabletId,
    pub inverted: bool,
    pub points: SmallVec<[StylusPoint; 4]>,
}
impl StylusEventArgs {
    #[must_use]
    pub fn new(
        routed_event: RoutedEvent,
        target: ElementId,
        timestamp: Timestamp,
        stylus: StylusDeviceId,
        tablet: TabletId,
    ) -> Self {
        Self {
            header: ArgsHeader::new(
                routed_event,
                Some(InputDevice::Stylus(stylus)),
                timestamp,
                Some(target),
            ),
            stylus,
            tablet,
            inverted: false,
            points: SmallVec::new(),
        }
    }
    /// The most recent position, if the event carries points.
    #[must_use]
    pub fn position(&self) -> Option<Point> {
        self.points.last().map(|point| point.position)
    }
}
