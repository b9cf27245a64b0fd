//! Typed input events, as dispatched along the element tree.
//!
//! Every event is one variant of the closed [`InputEventArgs`] set. Handlers are registered for a
//! concrete args type (see [`FromInputArgs`]) and receive it already unwrapped, so there are no
//! casts at dispatch time.

mod args;

pub use args::{
    InputReportEventArgs, KeyEventArgs, KeyboardFocusChangedEventArgs, MouseButtonEventArgs,
    MouseEventArgs, MouseWheelEventArgs, StylusEventArgs, TextCompositionEventArgs,
};

use crate::{
    command::{CanExecuteRoutedEventArgs, ExecutedRoutedEventArgs},
    report::Timestamp,
    ElementId, StylusDeviceId,
};

/// How an event travels along the route from the root to its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoutingStrategy {
    /// A preview pass from the root down to the source, then a pass from the source back up.
    TunnelBubble,
    /// From the source up to the root only.
    Bubble,
    /// The source alone.
    Direct,
}

/// Which pass of a route a handler is being invoked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, strum::AsRefStr)]
pub enum Phase {
    /// The preview pass, root first.
    Tunnel,
    #[default]
    Bubble,
    Direct,
}

/// Identity of a routed event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
pub enum RoutedEvent {
    /// A raw report before promotion. Seen by pipeline observers only.
    InputReport,
    KeyDown,
    KeyUp,
    GotKeyboardFocus,
    LostKeyboardFocus,
    TextInput,
    MouseMove,
    MouseDown,
    MouseUp,
    MouseWheel,
    LostMouseCapture,
    StylusInRange,
    StylusDown,
    StylusMove,
    StylusInAirMove,
    StylusUp,
    StylusOutOfRange,
    Executed,
    CanExecute,
}
impl RoutedEvent {
    #[must_use]
    pub fn strategy(self) -> RoutingStrategy {
        match self {
            Self::InputReport => RoutingStrategy::Direct,
            Self::LostMouseCapture => RoutingStrategy::Bubble,
            _ => RoutingStrategy::TunnelBubble,
        }
    }
}

/// The device an event originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputDevice {
    Keyboard,
    Mouse,
    Stylus(StylusDeviceId),
    Text,
}

/// State shared by every event variant.
///
/// The routed event, device and timestamp are fixed when the event is created.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgsHeader {
    routed_event: RoutedEvent,
    device: Option<InputDevice>,
    timestamp: Timestamp,
    source: Option<ElementId>,
    handled: bool,
    phase: Phase,
}
impl ArgsHeader {
    #[must_use]
    pub(crate) fn new(
        routed_event: RoutedEvent,
        device: Option<InputDevice>,
        timestamp: Timestamp,
        source: Option<ElementId>,
    ) -> Self {
        Self {
            routed_event,
            device,
            timestamp,
            source,
            handled: false,
            phase: Phase::default(),
        }
    }
    /// Reset everything but `handled` to `fixed`.
    pub(crate) fn restore(&mut self, fixed: &ArgsHeader) {
        let handled = self.handled;
        *self = fixed.clone();
        self.handled = handled;
    }
}

/// Write access to the header, kept inside the crate. Handlers may only flip `handled`.
#[enum_dispatch::enum_dispatch]
pub(crate) trait HeaderMut {
    fn header_mut(&mut self) -> &mut ArgsHeader;
}

/// Access to the [`ArgsHeader`] of any event variant.
#[enum_dispatch::enum_dispatch]
pub trait InputArgs {
    fn header(&self) -> &ArgsHeader;
    fn set_handled(&mut self, handled: bool);

    fn routed_event(&self) -> RoutedEvent {
        self.header().routed_event
    }
    fn device(&self) -> Option<InputDevice> {
        self.header().device
    }
    fn timestamp(&self) -> Timestamp {
        self.header().timestamp
    }
    /// The element the event is raised on.
    fn source(&self) -> Option<ElementId> {
        self.header().source
    }
    fn handled(&self) -> bool {
        self.header().handled
    }
    fn phase(&self) -> Phase {
        self.header().phase
    }
}

/// The closed set of events the pipeline and router carry.
#[enum_dispatch::enum_dispatch(InputArgs, HeaderMut)]
#[derive(Clone, Debug)]
pub enum InputEventArgs {
    Report(InputReportEventArgs),
    Key(KeyEventArgs),
    Focus(KeyboardFocusChangedEventArgs),
    Text(TextCompositionEventArgs),
    Mouse(MouseEventArgs),
    MouseButton(MouseButtonEventArgs),
    MouseWheel(MouseWheelEventArgs),
    Stylus(StylusEventArgs),
    Executed(ExecutedRoutedEventArgs),
    CanExecute(CanExecuteRoutedEventArgs),
}
impl InputEventArgs {
    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.header_mut().phase = phase;
    }
}

/// Unwraps one variant of [`InputEventArgs`], used for typed handler registration.
pub trait FromInputArgs: Sized {
    fn from_args_mut(args: &mut InputEventArgs) -> Option<&mut Self>;
}
impl FromInputArgs for InputEventArgs {
    fn from_args_mut(args: &mut InputEventArgs) -> Option<&mut Self> {
        Some(args)
    }
}

macro_rules! impl_args_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl InputArgs for $ty {
                fn header(&self) -> &ArgsHeader {
                    &self.header
                }
                fn set_handled(&mut self, handled: bool) {
                    self.header.handled = handled;
                }
            }
            impl HeaderMut for $ty {
                fn header_mut(&mut self) -> &mut ArgsHeader {
                    &mut self.header
                }
            }
            impl FromInputArgs for $ty {
                fn from_args_mut(args: &mut InputEventArgs) -> Option<&mut Self> {
                    match args {
                        InputEventArgs::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}
impl_args_variant! {
    Report => InputReportEventArgs,
    Key => KeyEventArgs,
    Focus => KeyboardFocusChangedEventArgs,
    Text => TextCompositionEventArgs,
    Mouse => MouseEventArgs,
    MouseButton => MouseButtonEventArgs,
    MouseWheel => MouseWheelEventArgs,
    Stylus => StylusEventArgs,
    Executed => ExecutedRoutedEventArgs,
    CanExecute => CanExecuteRoutedEventArgs,
}
