//! # Tablets
//!
//! A tablet is the logical device providing the system with stylus data, and the surface
//! styluses report their interactions with. These descriptions are what a
//! [`TabletDriver`](crate::pen::TabletDriver) hands back when enumerating hardware.
//!
//! A single physical pen with a tip and an eraser appears as *two* stylus devices, one per end,
//! which can be re-associated through [`StylusDeviceInfo::hardware_id`].

use smallvec::SmallVec;

use crate::{axis::PointDescription, StylusDeviceId, TabletId};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct UsbId {
    /// Vendor ID
    pub vid: u16,
    /// Product ID
    pub pid: u16,
}

/// How the tablet relates to the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum TabletKind {
    /// A screen-less tablet mapped onto the display.
    Stylus,
    /// A pen display or touch screen.
    Touch,
}

/// Physical and logical extents of the sensing area.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TabletSize {
    /// Sensing area in HIMETRIC units (0.01mm).
    pub himetric: [i32; 2],
    /// Area of the screen the tablet is mapped to, in logical pixels.
    pub screen: [f64; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum StylusKind {
    Pen,
    /// The nib found on the reverse of some styli, primarily intended to erase.
    Eraser,
    /// A touch contact.
    Finger,
    /// A mouse-like puck resting on the tablet, reporting absolute coordinates.
    Puck,
}

/// A barrel button on a stylus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StylusButtonInfo {
    pub name: Option<String>,
    /// Driver-assigned identifier, stable for the life of the device.
    pub id: u32,
}

/// Description of one stylus end known to a tablet.
#[derive(Clone, Debug, PartialEq)]
pub struct StylusDeviceInfo {
    pub id: StylusDeviceId,
    pub name: Option<String>,
    /// An identifier baked into the hardware, shared by the tip and eraser of one pen.
    /// `None` is unknown and does not imply relationships with other devices of id `None`.
    pub hardware_id: Option<u64>,
    pub kind: Option<StylusKind>,
    pub buttons: SmallVec<[StylusButtonInfo; 2]>,
}
impl StylusDeviceInfo {
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.kind == Some(StylusKind::Eraser)
    }
}

/// See [module level docs](`crate::tablet`) for details.
#[derive(Clone, Debug, PartialEq)]
pub struct TabletDeviceInfo {
    pub id: TabletId,
    pub name: String,
    pub usb_id: Option<UsbId>,
    pub kind: TabletKind,
    pub size: TabletSize,
    /// Axes carried by every packet from this tablet.
    pub axes: PointDescription,
    /// Stylus devices seen so far.
    /// Refreshed by [`TabletDriver::refresh_styluses`](crate::pen::TabletDriver::refresh_styluses).
    pub styluses: Vec<StylusDeviceInfo>,
}
impl TabletDeviceInfo {
    #[must_use]
    pub fn stylus(&self, id: StylusDeviceId) -> Option<&StylusDeviceInfo> {
        self.styluses.iter().find(|stylus| stylus.id == id)
    }
    /// Replace the known styluses, keeping the order stable for ids that persist.
    pub fn merge_styluses(&mut self, fresh: Vec<StylusDeviceInfo>) {
        self.styluses.retain(|known| fresh.iter().any(|f| f.id == known.id));
        for stylus in fresh {
            match self.styluses.iter_mut().find(|known| known.id == stylus.id) {
                Some(known) => *known = stylus,
                None => self.styluses.push(stylus),
            }
        }
    }
}
