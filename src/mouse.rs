//! # Mouse
//!
//! [`MouseDevice`] tracks the pointer position, which buttons are held, what element is under
//! the pointer, and mouse capture. A captured element receives every mouse event regardless of
//! the pointer position (or, for [`CaptureMode::SubTree`], every event not over one of its own
//! descendants).
//!
//! Multi-clicks are counted here: a press of the same button within the system's double-click
//! time and box of the previous press counts one higher.

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    events::{
        InputEventArgs, MouseButtonEventArgs, MouseEventArgs, MouseWheelEventArgs, RoutedEvent,
    },
    report::{InputReport, RawMouseActions, RawMouseInput, Timestamp},
    route::ElementTree,
    system::SystemInputState,
    util::Point,
    ElementId, SourceId,
};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::FromRepr,
    strum::EnumCount,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[repr(u8)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    XButton1,
    XButton2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MouseButtonState {
    #[default]
    Released,
    Pressed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    #[default]
    None,
    /// Every event goes to the captured element.
    Element,
    /// Events over descendants of the captured element go to them, everything else to the
    /// captured element.
    SubTree,
}

#[derive(Clone, Copy, Debug)]
struct LastClick {
    button: MouseButton,
    timestamp: Timestamp,
    position: Point,
    count: u32,
}

/// See [module level docs](`crate::mouse`) for details.
#[derive(Debug, Default)]
pub struct MouseDevice {
    active_source: Option<SourceId>,
    position: Point,
    buttons: [MouseButtonState; <MouseButton as strum::EnumCount>::COUNT],
    directly_over: Option<ElementId>,
    captured: Option<ElementId>,
    capture_mode: CaptureMode,
    last_click: Option<LastClick>,
}

/// # Queries
impl MouseDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_source.is_some()
    }
    #[must_use]
    pub fn active_source(&self) -> Option<SourceId> {
        self.active_source
    }
    /// Last reported position, relative to [`Self::active_source`].
    #[must_use]
    pub fn position(&self) -> Point {
        self.position
    }
    /// The element under the pointer as of the last report, ignoring capture.
    #[must_use]
    pub fn directly_over(&self) -> Option<ElementId> {
        self.directly_over
    }
    #[must_use]
    pub fn captured(&self) -> Option<ElementId> {
        self.captured
    }
    #[must_use]
    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }
    /// State of `button` as of the last promoted report.
    #[must_use]
    pub fn button_state(&self, button: MouseButton) -> MouseButtonState {
        self.buttons[button as usize]
    }
    /// Live state of `button`. An inactive mouse reports every button released.
    #[must_use]
    pub fn button_state_from_system(
        &self,
        system: &dyn SystemInputState,
        button: MouseButton,
    ) -> MouseButtonState {
        if self.is_active() && system.button_pressed(button) {
            MouseButtonState::Pressed
        } else {
            MouseButtonState::Released
        }
    }
}

/// # State changes
impl MouseDevice {
    /// Route all mouse input to `element`. `None`, or [`CaptureMode::None`], releases capture.
    ///
    /// Returns the previously captured element, which has lost capture if it differs.
    pub(crate) fn set_capture(
        &mut self,
        element: Option<ElementId>,
        mode: CaptureMode,
    ) -> Option<ElementId> {
        let (element, mode) = match (element, mode) {
            (Some(element), CaptureMode::Element | CaptureMode::SubTree) => (Some(element), mode),
            _ => (None, CaptureMode::None),
        };
        trace!(?element, ?mode, "mouse capture");
        self.capture_mode = mode;
        std::mem::replace(&mut self.captured, element)
    }
    /// Where events at the current position go, honoring capture.
    fn target<T: ElementTree + ?Sized>(&self, tree: &T) -> Option<ElementId> {
        match (self.captured, self.capture_mode) {
            (Some(captured), CaptureMode::Element) => Some(captured),
            (Some(captured), CaptureMode::SubTree) => match self.directly_over {
                Some(over) if tree.is_ancestor_of(captured, over) => Some(over),
                _ => Some(captured),
            },
            _ => self.directly_over,
        }
    }
    fn release_capture(
        &mut self,
        timestamp: Timestamp,
        promoted: &mut SmallVec<[InputEventArgs; 2]>,
    ) {
        if let Some(lost) = self.set_capture(None, CaptureMode::None) {
            debug!(?lost, "mouse capture canceled");
            promoted.push(
                MouseEventArgs::new(RoutedEvent::LostMouseCapture, lost, timestamp, self.position)
                    .into(),
            );
        }
    }
    fn click_count(
        &mut self,
        button: MouseButton,
        timestamp: Timestamp,
        system: &dyn SystemInputState,
    ) -> u32 {
        let (width, height) = system.double_click_size();
        let count = match self.last_click {
            Some(last)
                if last.button == button
                    && timestamp - last.timestamp <= system.double_click_time()
                    && last.position.within(self.position, width, height) =>
            {
                last.count + 1
            }
            _ => 1,
        };
        self.last_click = Some(LastClick {
            button,
            timestamp,
            position: self.position,
            count,
        });
        count
    }
    /// Apply a mouse report, returning the typed events to raise, in order.
    pub(crate) fn promote<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        report: &InputReport,
        raw: &RawMouseInput,
        system: &dyn SystemInputState,
    ) -> SmallVec<[InputEventArgs; 2]> {
        let mut promoted = SmallVec::new();
        let timestamp = report.timestamp();
        let actions = raw.actions;

        if actions.contains(RawMouseActions::DEACTIVATE) {
            debug!(source = ?report.source(), "mouse deactivated");
            self.active_source = None;
            self.buttons = Default::default();
            self.directly_over = None;
            self.last_click = None;
            self.release_capture(timestamp, &mut promoted);
            return promoted;
        }
        if actions.contains(RawMouseActions::ACTIVATE) || !self.is_active() {
            debug!(source = ?report.source(), "mouse activated");
            self.active_source = Some(report.source());
            for (index, state) in self.buttons.iter_mut().enumerate() {
                let pressed =
                    MouseButton::from_repr(index as u8).is_some_and(|b| system.button_pressed(b));
                *state = if pressed {
                    MouseButtonState::Pressed
                } else {
                    MouseButtonState::Released
                };
            }
        }
        if actions.contains(RawMouseActions::CANCEL_CAPTURE) {
            self.release_capture(timestamp, &mut promoted);
        }

        self.position = raw.position;
        self.directly_over = tree.hit_test(report.source(), raw.position);
        let Some(target) = self.target(tree) else {
            // Still track buttons over empty space.
            for (index, &(press, release)) in RawMouseActions::BUTTONS.iter().enumerate() {
                if actions.contains(press) {
                    self.buttons[index] = MouseButtonState::Pressed;
                } else if actions.contains(release) {
                    self.buttons[index] = MouseButtonState::Released;
                }
            }
            return promoted;
        };

        if actions.intersects(RawMouseActions::ANY_MOVE) {
            promoted.push(
                MouseEventArgs::new(RoutedEvent::MouseMove, target, timestamp, self.position)
                    .into(),
            );
        }
        for (index, &(press, release)) in RawMouseActions::BUTTONS.iter().enumerate() {
            let Some(button) = MouseButton::from_repr(index as u8) else {
                continue;
            };
            if actions.contains(press) {
                self.buttons[index] = MouseButtonState::Pressed;
                let count = self.click_count(button, timestamp, system);
                promoted.push(
                    MouseButtonEventArgs::new(
                        target,
                        timestamp,
                        self.position,
                        button,
                        MouseButtonState::Pressed,
                        count,
                    )
                    .into(),
                );
            } else if actions.contains(release) {
                self.buttons[index] = MouseButtonState::Released;
                promoted.push(
                    MouseButtonEventArgs::new(
                        target,
                        timestamp,
                        self.position,
                        button,
                        MouseButtonState::Released,
                        0,
                    )
                    .into(),
                );
            }
        }
        if actions.contains(RawMouseActions::VERTICAL_WHEEL_ROTATE) {
            promoted.push(
                MouseWheelEventArgs::new(target, timestamp, self.position, raw.wheel, false).into(),
            );
        }
        if actions.contains(RawMouseActions::HORIZONTAL_WHEEL_ROTATE) {
            promoted.push(
                MouseWheelEventArgs::new(target, timestamp, self.position, raw.wheel, true).into(),
            );
        }
        promoted
    }
}
