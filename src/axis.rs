//! Stylus point data and the per-tablet description of which axes a point carries.

use crate::util::{NicheF32, Point};

bitflags::bitflags! {
    /// The optional axes of a stylus point. Position is always present.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct AvailableAxes: u16 {
        const PRESSURE = 1;
        const TILT = 2;
        const DISTANCE = 4;
        const ROLL = 8;
        const BUTTON_PRESSURE = 16;
    }
}

/// Range of an axis's reported value.
///
/// A hint only: values are not clamped and hardware may exceed it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Limits {
    pub min: f32,
    pub max: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisInfo {
    pub limits: Option<Limits>,
    /// Distinct values the hardware reports across the limits, if known.
    pub granularity: Option<u32>,
}

/// Which axes a tablet advertises for its packets. `None` for unsupported axes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointDescription {
    pub position: AxisInfo,
    pub pressure: Option<AxisInfo>,
    pub tilt: Option<AxisInfo>,
    pub distance: Option<AxisInfo>,
    pub roll: Option<AxisInfo>,
    pub button_pressure: Option<AxisInfo>,
}
impl PointDescription {
    #[must_use]
    pub fn available(&self) -> AvailableAxes {
        [
            (self.pressure, AvailableAxes::PRESSURE),
            (self.tilt, AvailableAxes::TILT),
            (self.distance, AvailableAxes::DISTANCE),
            (self.roll, AvailableAxes::ROLL),
            (self.button_pressure, AvailableAxes::BUTTON_PRESSURE),
        ]
        .into_iter()
        .filter_map(|(info, axis)| info.map(|_| axis))
        .collect()
    }
    /// Axes `point` carries although this description does not advertise them.
    #[must_use]
    pub fn unadvertised(&self, point: &StylusPoint) -> AvailableAxes {
        point.present_axes() - self.available()
    }
}

/// One sample of a stylus' state.
///
/// # Quirks
/// Hardware may report axes the tablet never advertised, and skip ones it did.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct StylusPoint {
    /// Logical pixels relative to the input source, possibly sub-pixel.
    pub position: Point,
    /// Normalized `0..=1`.
    pub pressure: NicheF32,
    /// Tilt from perpendicular along the X and Y axes, in radians.
    pub tilt: Option<[f32; 2]>,
    pub distance: NicheF32,
    pub roll: NicheF32,
    pub button_pressure: NicheF32,
}
impl StylusPoint {
    /// A point with only a position.
    #[must_use]
    pub fn at(position: Point) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
    /// Which optional axes this point actually carries.
    #[must_use]
    pub fn present_axes(&self) -> AvailableAxes {
        let mut axes = AvailableAxes::empty();
        axes.set(AvailableAxes::PRESSURE, self.pressure.get().is_some());
        axes.set(AvailableAxes::TILT, self.tilt.is_some());
        axes.set(AvailableAxes::DISTANCE, self.distance.get().is_some());
        axes.set(AvailableAxes::ROLL, self.roll.get().is_some());
        axes.set(AvailableAxes::BUTTON_PRESSURE, self.button_pressure.get().is_some());
        axes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_summary_matches_fields() {
        let description = PointDescription {
            pressure: Some(AxisInfo {
                limits: Some(Limits { min: 0.0, max: 1.0 }),
                granularity: Some(8192),
            }),
            tilt: Some(AxisInfo::default()),
            ..PointDescription::default()
        };
        assert_eq!(description.available(), AvailableAxes::PRESSURE | AvailableAxes::TILT);
    }

    #[test]
    fn unadvertised_axes_are_detected() {
        let description = PointDescription {
            pressure: Some(AxisInfo::default()),
            ..PointDescription::default()
        };
        let mut point = StylusPoint::at(Point::new(1.0, 2.0));
        assert_eq!(point.present_axes(), AvailableAxes::empty());
        point.pressure = NicheF32::new_some(0.25).unwrap();
        point.roll = NicheF32::new_some(1.0).unwrap();
        assert_eq!(point.present_axes(), AvailableAxes::PRESSURE | AvailableAxes::ROLL);
        assert_eq!(description.unadvertised(&point), AvailableAxes::ROLL);
    }
}
