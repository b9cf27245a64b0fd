//! # Routed input for retained-mode UI 🐙✨
//!
//! Turns raw platform input (keyboard and mouse messages, tablet packets, text, UI-state and
//! application commands) into typed events routed through a host's element tree.
//!
//! Input travels in three layers:
//! * [`InputReport`](report::InputReport)s are validated records of one hardware event. A report
//!   that exists is well formed.
//! * The [`InputManager`] runs each report through its stages: pre-notify, pre-process (which may
//!   cancel), routed dispatch, post-process (where devices promote raw reports into typed events),
//!   and post-notify.
//! * Typed events travel along the element tree through the [`EventRouter`](route::EventRouter),
//!   tunneling from the root and bubbling back up, until handled.
//!
//! The element tree itself belongs to the host and is only ever seen through
//! [`ElementTree`](route::ElementTree). Likewise the live OS input state is reached through
//! [`SystemInputState`](system::SystemInputState) and tablet hardware through
//! [`TabletDriver`](pen::TabletDriver).
//!
//! To get started, create a [`Builder`].
//!
//! ## Pen input
//! Tablet contexts are serviced on background workers handed out by a
//! [`PenThreadPool`](pen::PenThreadPool). The pool is a plain value: create one wherever pen
//! input is needed and keep it alive for as long as its contexts are.

#![warn(clippy::pedantic)]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod axis;
pub mod builder;
pub mod command;
pub mod events;
pub mod keyboard;
pub mod manager;
pub mod mouse;
pub mod pen;
pub mod report;
pub mod route;
pub mod staging;
pub mod stylus;
pub mod system;
pub mod tablet;
pub mod util;

pub use builder::Builder;
pub use manager::InputManager;

pub(crate) mod macro_bits {
    /// Implements a public opaque ID wrapping a raw integer handed out by the host or a driver.
    macro_rules! impl_id {
        ($(#[$meta:meta])* $id_name:ident($raw:ty)) => {
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
            #[allow(clippy::module_name_repetitions)]
            pub struct $id_name($raw);

            impl $id_name {
                #[must_use]
                pub const fn new(raw: $raw) -> Self {
                    Self(raw)
                }
                /// The raw value this ID was made from.
                #[must_use]
                pub const fn get(self) -> $raw {
                    self.0
                }
            }
        };
    }
    // Weird hacks to allow use from submodules..
    pub(crate) use impl_id;
}

macro_bits::impl_id!(
    /// An element of the host's tree.
    /// Only meaningful to the host's [`ElementTree`](route::ElementTree).
    ElementId(u64)
);
macro_bits::impl_id!(
    /// The surface an input report was delivered to, usually a top-level window.
    SourceId(u32)
);
macro_bits::impl_id!(
    /// A native window a pen context is created for.
    WindowId(u64)
);
macro_bits::impl_id!(
    /// Opaque, transient ID of a tablet, assigned by the driver. Will not be stable across
    /// unplugs/replugs!
    TabletId(u32)
);
macro_bits::impl_id!(
    /// Opaque, transient ID of a stylus, assigned by the driver.
    StylusDeviceId(u32)
);
