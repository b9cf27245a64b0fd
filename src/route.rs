//! Route building and routed dispatch.
//!
//! The element tree itself belongs to the host UI; this crate only needs to walk parents and
//! hit test, see [`ElementTree`]. For each event a route is collected once, from the source up to
//! the root, then handlers run root-first for the preview pass and source-first for the bubble
//! pass. A handled event skips the remaining handlers unless they asked for handled events too.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::{
    command::CommandBindings,
    events::{
        FromInputArgs, HeaderMut, InputArgs, InputEventArgs, Phase, RoutedEvent, RoutingStrategy,
    },
    util::Point,
    ElementId, SourceId,
};

/// Routes longer than this are assumed to come from a cyclic tree and are cut.
const MAX_ROUTE_DEPTH: usize = 4096;

/// What the pipeline needs from the host's element tree.
pub trait ElementTree {
    fn parent(&self, element: ElementId) -> Option<ElementId>;
    /// The topmost element under `position` on the surface of `source`.
    fn hit_test(&self, source: SourceId, position: Point) -> Option<ElementId>;
    /// Whether `ancestor` is `element` or one of its ancestors.
    fn is_ancestor_of(&self, ancestor: ElementId, element: ElementId) -> bool {
        EventRoute::build(self, element).iter_bubbling().any(|e| e == ancestor)
    }
}

/// Elements from the source (index 0) to the root (last index).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRoute {
    nodes: SmallVec<[ElementId; 16]>,
}
impl EventRoute {
    pub fn build<T: ElementTree + ?Sized>(tree: &T, source: ElementId) -> Self {
        let mut nodes = SmallVec::new();
        let mut next = Some(source);
        while let Some(element) = next {
            if nodes.len() == MAX_ROUTE_DEPTH {
                warn!(?source, "route exceeded maximum depth, tree may be cyclic");
                break;
            }
            nodes.push(element);
            next = tree.parent(element);
        }
        Self { nodes }
    }
    #[must_use]
    pub fn source(&self) -> Option<ElementId> {
        self.nodes.first().copied()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    /// Iterate from source to root.
    pub fn iter_bubbling(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.nodes.iter().copied()
    }
    /// Iterate from root to source.
    pub fn iter_tunneling(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.nodes.iter().rev().copied()
    }
}

/// Identifies a registered handler, for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type BoxedHandler = Box<dyn FnMut(ElementId, &mut InputEventArgs)>;

struct HandlerEntry {
    id: HandlerId,
    phase: Phase,
    handled_too: bool,
    handler: BoxedHandler,
}

/// Per-element handler registry and dispatcher.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<(ElementId, RoutedEvent), Vec<HandlerEntry>>,
    next_id: u64,
    pub(crate) commands: CommandBindings,
}
impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("handlers", &self.handlers.values().map(Vec::len).sum::<usize>())
            .field("commands", &self.commands)
            .finish()
    }
}

/// # Registration
impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Register a handler for `event` on `element`, skipped once the event is handled.
    ///
    /// `T` is the args type the handler expects. Events whose args are a different variant
    /// never reach it.
    pub fn add_handler<T, F>(
        &mut self,
        element: ElementId,
        event: RoutedEvent,
        phase: Phase,
        handler: F,
    ) -> HandlerId
    where
        T: FromInputArgs + 'static,
        F: FnMut(ElementId, &mut T) + 'static,
    {
        self.add_handler_with(element, event, phase, false, handler)
    }
    /// Like [`Self::add_handler`], optionally invoked even for handled events.
    pub fn add_handler_with<T, F>(
        &mut self,
        element: ElementId,
        event: RoutedEvent,
        phase: Phase,
        handled_too: bool,
        mut handler: F,
    ) -> HandlerId
    where
        T: FromInputArgs + 'static,
        F: FnMut(ElementId, &mut T) + 'static,
    {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        let handler: BoxedHandler = Box::new(move |sender, args| {
            if let Some(args) = T::from_args_mut(args) {
                handler(sender, args);
            }
        });
        self.handlers
            .entry((element, event))
            .or_default()
            .push(HandlerEntry {
                id,
                phase,
                handled_too,
                handler,
            });
        id
    }
    /// Returns whether a handler was removed.
    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        for entries in self.handlers.values_mut() {
            if let Some(index) = entries.iter().position(|entry| entry.id == id) {
                entries.remove(index);
                return true;
            }
        }
        false
    }
    /// Drop every handler and binding attached to `element`.
    pub fn clear_element(&mut self, element: ElementId) {
        self.handlers.retain(|(owner, _), _| *owner != element);
        self.commands.clear_element(element);
    }
}

/// # Dispatch
impl EventRouter {
    /// Raise `args` on its source, returning whether it ended up handled.
    ///
    /// Events without a source are not routed.
    pub fn raise<T: ElementTree + ?Sized>(&mut self, tree: &T, args: &mut InputEventArgs) -> bool {
        let Some(source) = args.source() else {
            return args.handled();
        };
        let route = EventRoute::build(tree, source);
        let event = args.routed_event();
        trace!(?event, ?source, len = route.len(), "raising routed event");
        match event.strategy() {
            RoutingStrategy::TunnelBubble => {
                for element in route.iter_tunneling() {
                    self.invoke(element, event, Phase::Tunnel, args);
                }
                for element in route.iter_bubbling() {
                    self.invoke(element, event, Phase::Bubble, args);
                }
            }
            RoutingStrategy::Bubble => {
                for element in route.iter_bubbling() {
                    self.invoke(element, event, Phase::Bubble, args);
                }
            }
            RoutingStrategy::Direct => self.invoke(source, event, Phase::Direct, args),
        }
        args.handled()
    }
    /// Handlers get the args mutably, but only `handled` and the payload survive them.
    fn invoke(
        &mut self,
        element: ElementId,
        event: RoutedEvent,
        phase: Phase,
        args: &mut InputEventArgs,
    ) {
        args.set_phase(phase);
        let fixed = args.header().clone();
        // Bindings act as class handlers and run before instance handlers.
        self.commands.invoke(element, phase, args);
        args.header_mut().restore(&fixed);
        let Some(entries) = self.handlers.get_mut(&(element, event)) else {
            return;
        };
        for entry in entries.iter_mut().filter(|entry| entry.phase == phase) {
            if args.handled() && !entry.handled_too {
                continue;
            }
            (entry.handler)(element, args);
            args.header_mut().restore(&fixed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{InputDevice, KeyEventArgs},
        keyboard::VirtualKey,
        report::Timestamp,
    };
    use std::{cell::RefCell, rc::Rc};

    /// 1 <- 2 <- 3
    struct Chain;
    impl ElementTree for Chain {
        fn parent(&self, element: ElementId) -> Option<ElementId> {
            (element.get() > 1).then(|| ElementId::new(element.get() - 1))
        }
        fn hit_test(&self, _: SourceId, _: Point) -> Option<ElementId> {
            None
        }
    }

    fn key_down(target: u64) -> InputEventArgs {
        KeyEventArgs::new(
            RoutedEvent::KeyDown,
            ElementId::new(target),
            Timestamp::default(),
            VirtualKey::A,
        )
        .into()
    }

    #[test]
    fn tunnel_then_bubble_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut router = EventRouter::new();
        for id in 1..=3 {
            for phase in [Phase::Tunnel, Phase::Bubble] {
                let log = log.clone();
                router.add_handler(
                    ElementId::new(id),
                    RoutedEvent::KeyDown,
                    phase,
                    move |sender, _: &mut KeyEventArgs| {
                        log.borrow_mut().push((phase, sender.get()));
                    },
                );
            }
        }
        let mut args = key_down(3);
        assert!(!router.raise(&Chain, &mut args));
        assert_eq!(
            *log.borrow(),
            [
                (Phase::Tunnel, 1),
                (Phase::Tunnel, 2),
                (Phase::Tunnel, 3),
                (Phase::Bubble, 3),
                (Phase::Bubble, 2),
                (Phase::Bubble, 1),
            ]
        );
    }

    #[test]
    fn handled_short_circuits_unless_requested() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut router = EventRouter::new();
        router.add_handler(
            ElementId::new(3),
            RoutedEvent::KeyDown,
            Phase::Bubble,
            |_, args: &mut KeyEventArgs| args.set_handled(true),
        );
        let s = seen.clone();
        router.add_handler(
            ElementId::new(2),
            RoutedEvent::KeyDown,
            Phase::Bubble,
            move |_, _: &mut KeyEventArgs| s.borrow_mut().push("skipped"),
        );
        let s = seen.clone();
        router.add_handler_with(
            ElementId::new(1),
            RoutedEvent::KeyDown,
            Phase::Bubble,
            true,
            move |_, _: &mut KeyEventArgs| s.borrow_mut().push("handled too"),
        );
        let mut args = key_down(3);
        assert!(router.raise(&Chain, &mut args));
        assert_eq!(*seen.borrow(), ["handled too"]);
    }

    #[test]
    fn handlers_cannot_change_event_identity() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut router = EventRouter::new();
        router.add_handler(
            ElementId::new(2),
            RoutedEvent::KeyDown,
            Phase::Tunnel,
            |_, args: &mut KeyEventArgs| {
                *args = KeyEventArgs::new(
                    RoutedEvent::KeyUp,
                    ElementId::new(9),
                    Timestamp::from_millis(999),
                    VirtualKey::Z,
                );
            },
        );
        for event in [RoutedEvent::KeyDown, RoutedEvent::KeyUp] {
            let s = seen.clone();
            router.add_handler(
                ElementId::new(1),
                event,
                Phase::Bubble,
                move |_, args: &mut KeyEventArgs| {
                    s.borrow_mut().push((event, args.routed_event(), args.phase()));
                },
            );
        }
        let mut args = key_down(3);
        assert!(!router.raise(&Chain, &mut args));
        assert_eq!(
            *seen.borrow(),
            [(RoutedEvent::KeyDown, RoutedEvent::KeyDown, Phase::Bubble)]
        );
        assert_eq!(args.routed_event(), RoutedEvent::KeyDown);
        assert_eq!(args.source(), Some(ElementId::new(3)));
        assert_eq!(args.timestamp(), Timestamp::default());
        assert_eq!(args.device(), Some(InputDevice::Keyboard));
        let InputEventArgs::Key(key) = &args else {
            panic!("still a key event");
        };
        assert_eq!(key.key, VirtualKey::Z, "the payload is the handler's to change");
    }

    #[test]
    fn removed_handlers_do_not_run() {
        let count = Rc::new(RefCell::new(0));
        let mut router = EventRouter::new();
        let c = count.clone();
        let id = router.add_handler(
            ElementId::new(1),
            RoutedEvent::KeyDown,
            Phase::Bubble,
            move |_, _: &mut InputEventArgs| *c.borrow_mut() += 1,
        );
        router.raise(&Chain, &mut key_down(1));
        assert!(router.remove_handler(id));
        assert!(!router.remove_handler(id));
        router.raise(&Chain, &mut key_down(1));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn route_order() {
        let route = EventRoute::build(&Chain, ElementId::new(3));
        assert_eq!(route.source(), Some(ElementId::new(3)));
        let up: Vec<_> = route.iter_bubbling().map(ElementId::get).collect();
        assert_eq!(up, [3, 2, 1]);
        assert!(Chain.is_ancestor_of(ElementId::new(1), ElementId::new(3)));
        assert!(!Chain.is_ancestor_of(ElementId::new(3), ElementId::new(1)));
    }
}
