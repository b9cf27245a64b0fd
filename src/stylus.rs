//! # Stylus
//!
//! [`StylusLogic`] keeps a small state machine per stylus device:
//! out of range, hovering in range, or down on the surface. Drivers are not always tidy about
//! the order they report transitions in (a tip can touch down without the stylus ever having
//! been reported in range), so missing transitions are synthesized to keep every element's view
//! of the stylus consistent: `StylusInRange` always precedes `StylusDown`, and `StylusUp` always
//! precedes `StylusOutOfRange`.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    events::{RoutedEvent, StylusEventArgs},
    pen::PenPacket,
    report::{InputMode, InputReport, RawStylusActions, RawStylusInput, ReportError},
    route::ElementTree,
    util::Point,
    ElementId, SourceId, StylusDeviceId, TabletId,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StylusPhase {
    #[default]
    OutOfRange,
    /// In range of the surface, but not touching it.
    InAir,
    Down,
}

#[derive(Clone, Copy, Debug)]
struct StylusState {
    phase: StylusPhase,
    tablet: TabletId,
    position: Option<Point>,
    captured: Option<ElementId>,
}

/// See [module level docs](`crate::stylus`) for details.
#[derive(Debug, Default)]
pub struct StylusLogic {
    styluses: HashMap<StylusDeviceId, StylusState>,
    current: Option<StylusDeviceId>,
}

/// # Queries
impl StylusLogic {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn phase(&self, stylus: StylusDeviceId) -> StylusPhase {
        self.styluses
            .get(&stylus)
            .map_or(StylusPhase::OutOfRange, |state| state.phase)
    }
    /// The stylus that sent the most recent report, while it remains in range.
    #[must_use]
    pub fn current_stylus(&self) -> Option<StylusDeviceId> {
        self.current
    }
    #[must_use]
    pub fn position(&self, stylus: StylusDeviceId) -> Option<Point> {
        self.styluses.get(&stylus).and_then(|state| state.position)
    }
    #[must_use]
    pub fn tablet(&self, stylus: StylusDeviceId) -> Option<TabletId> {
        self.styluses.get(&stylus).map(|state| state.tablet)
    }
    #[must_use]
    pub fn captured(&self, stylus: StylusDeviceId) -> Option<ElementId> {
        self.styluses.get(&stylus).and_then(|state| state.captured)
    }
}

/// # State changes
impl StylusLogic {
    /// Send every event of `stylus` to `element` until released or the stylus leaves range.
    ///
    /// Returns `false` if the stylus is out of range, as there is nothing to capture.
    pub fn capture(&mut self, stylus: StylusDeviceId, element: Option<ElementId>) -> bool {
        match self.styluses.get_mut(&stylus) {
            Some(state) => {
                state.captured = element;
                true
            }
            None => false,
        }
    }
    /// Turn a worker's packet into a validated stylus report delivered to `source`.
    /// # Errors
    /// Fails if the packet does not carry exactly one known action, or carries no points.
    pub fn report_from_packet(
        packet: &PenPacket,
        source: SourceId,
        mode: InputMode,
    ) -> Result<InputReport, ReportError> {
        InputReport::stylus(
            source,
            mode,
            packet.timestamp,
            RawStylusInput {
                actions: packet.actions,
                tablet: packet.tablet,
                stylus: packet.stylus,
                inverted: packet.inverted,
                points: packet.points.clone(),
            },
        )
    }
    /// Apply a stylus report, returning the typed events to raise, in order.
    pub(crate) fn promote<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        report: &InputReport,
        raw: &RawStylusInput,
    ) -> SmallVec<[StylusEventArgs; 2]> {
        let mut transitions: SmallVec<[RoutedEvent; 3]> = SmallVec::new();
        let position = raw.points.last().map(|point| point.position);
        let state = self.styluses.entry(raw.stylus).or_insert(StylusState {
            phase: StylusPhase::OutOfRange,
            tablet: raw.tablet,
            position,
            captured: None,
        });
        state.tablet = raw.tablet;
        if position.is_some() {
            state.position = position;
        }
        let actions = raw.actions;
        let phase = state.phase;
        let enter_range = |transitions: &mut SmallVec<[RoutedEvent; 3]>| {
            if phase == StylusPhase::OutOfRange {
                transitions.push(RoutedEvent::StylusInRange);
            }
        };
        let next = if actions.contains(RawStylusActions::IN_RANGE) {
            enter_range(&mut transitions);
            phase.max_in_air()
        } else if actions.contains(RawStylusActions::DOWN) {
            enter_range(&mut transitions);
            if phase != StylusPhase::Down {
                transitions.push(RoutedEvent::StylusDown);
            }
            StylusPhase::Down
        } else if actions.contains(RawStylusActions::MOVE) {
            if phase == StylusPhase::Down {
                transitions.push(RoutedEvent::StylusMove);
                StylusPhase::Down
            } else {
                // Contact moves without a down are hover moves in disguise.
                enter_range(&mut transitions);
                transitions.push(RoutedEvent::StylusInAirMove);
                StylusPhase::InAir
            }
        } else if actions.contains(RawStylusActions::IN_AIR_MOVE) {
            enter_range(&mut transitions);
            if phase == StylusPhase::Down {
                transitions.push(RoutedEvent::StylusUp);
            }
            transitions.push(RoutedEvent::StylusInAirMove);
            StylusPhase::InAir
        } else if actions.contains(RawStylusActions::UP) {
            if phase == StylusPhase::Down {
                transitions.push(RoutedEvent::StylusUp);
                StylusPhase::InAir
            } else {
                debug!(stylus = ?raw.stylus, "stylus up without down");
                phase
            }
        } else if actions
            .intersects(RawStylusActions::OUT_OF_RANGE | RawStylusActions::DEACTIVATE)
        {
            if phase == StylusPhase::Down {
                transitions.push(RoutedEvent::StylusUp);
            }
            if phase != StylusPhase::OutOfRange {
                transitions.push(RoutedEvent::StylusOutOfRange);
            }
            StylusPhase::OutOfRange
        } else {
            // Activation and system gestures carry no typed event.
            trace!(?actions, "stylus report not promoted");
            phase
        };
        state.phase = next;
        let captured = state.captured;
        if next == StylusPhase::OutOfRange {
            self.styluses.remove(&raw.stylus);
            if self.current == Some(raw.stylus) {
                self.current = None;
            }
        } else {
            self.current = Some(raw.stylus);
        }

        let target = captured.or_else(|| {
            position
                .or_else(|| self.position(raw.stylus))
                .and_then(|position| tree.hit_test(report.source(), position))
        });
        let Some(target) = target else {
            return SmallVec::new();
        };
        transitions
            .into_iter()
            .map(|event| {
                let mut args =
                    StylusEventArgs::new(event, target, report.timestamp(), raw.stylus, raw.tablet);
                args.inverted = raw.inverted;
                args.points.clone_from(&raw.points);
                args
            })
            .collect()
    }
}

impl StylusPhase {
    /// Entering range never lifts a stylus that is down.
    fn max_in_air(self) -> Self {
        match self {
            Self::Down => Self::Down,
            Self::OutOfRange | Self::InAir => Self::InAir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{axis::StylusPoint, events::InputArgs, report::Timestamp};

    struct Surface;
    impl ElementTree for Surface {
        fn parent(&self, _: ElementId) -> Option<ElementId> {
            None
        }
        fn hit_test(&self, _: SourceId, _: Point) -> Option<ElementId> {
            Some(ElementId::new(1))
        }
    }

    fn stylus(actions: RawStylusActions) -> (InputReport, RawStylusInput) {
        let raw = RawStylusInput {
            actions,
            tablet: TabletId::new(1),
            stylus: StylusDeviceId::new(7),
            inverted: false,
            points: [StylusPoint::at(Point::new(3.0, 4.0))].into_iter().collect(),
        };
        let report = InputReport::stylus(
            SourceId::new(1),
            InputMode::Foreground,
            Timestamp::default(),
            raw.clone(),
        )
        .unwrap();
        (report, raw)
    }

    fn events(logic: &mut StylusLogic, actions: RawStylusActions) -> Vec<RoutedEvent> {
        let (report, raw) = stylus(actions);
        logic
            .promote(&Surface, &report, &raw)
            .iter()
            .map(InputArgs::routed_event)
            .collect()
    }

    #[test]
    fn down_synthesizes_in_range() {
        let mut logic = StylusLogic::new();
        assert_eq!(
            events(&mut logic, RawStylusActions::DOWN),
            [RoutedEvent::StylusInRange, RoutedEvent::StylusDown]
        );
        assert_eq!(logic.phase(StylusDeviceId::new(7)), StylusPhase::Down);
        assert_eq!(events(&mut logic, RawStylusActions::MOVE), [RoutedEvent::StylusMove]);
        assert_eq!(
            events(&mut logic, RawStylusActions::OUT_OF_RANGE),
            [RoutedEvent::StylusUp, RoutedEvent::StylusOutOfRange]
        );
        assert_eq!(logic.phase(StylusDeviceId::new(7)), StylusPhase::OutOfRange);
        assert_eq!(logic.current_stylus(), None);
    }

    #[test]
    fn hover_cycle() {
        let mut logic = StylusLogic::new();
        assert_eq!(events(&mut logic, RawStylusActions::IN_RANGE), [RoutedEvent::StylusInRange]);
        assert_eq!(
            events(&mut logic, RawStylusActions::IN_AIR_MOVE),
            [RoutedEvent::StylusInAirMove]
        );
        assert!(events(&mut logic, RawStylusActions::UP).is_empty());
        assert!(events(&mut logic, RawStylusActions::SYSTEM_GESTURE).is_empty());
        assert_eq!(logic.current_stylus(), Some(StylusDeviceId::new(7)));
        assert_eq!(logic.position(StylusDeviceId::new(7)), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn capture_requires_range() {
        let mut logic = StylusLogic::new();
        assert!(!logic.capture(StylusDeviceId::new(7), Some(ElementId::new(9))));
        events(&mut logic, RawStylusActions::IN_RANGE);
        assert!(logic.capture(StylusDeviceId::new(7), Some(ElementId::new(9))));
        let (report, raw) = stylus(RawStylusActions::DOWN);
        let promoted = logic.promote(&Surface, &report, &raw);
        assert_eq!(promoted[0].source(), Some(ElementId::new(9)));
    }
}
