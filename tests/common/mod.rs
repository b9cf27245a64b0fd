//! Shared fixtures: a parent-map element tree, an event recorder and a scripted tablet driver.
#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::{Arc, Mutex},
};

use routed_input::{
    events::{InputArgs, InputEventArgs, Phase, RoutedEvent},
    pen::{ContextHandle, DriverError, PenPacket, TabletDriver},
    route::{ElementTree, EventRouter},
    tablet::{StylusDeviceInfo, TabletDeviceInfo},
    util::Point,
    ElementId, SourceId, TabletId, WindowId,
};

pub fn id(raw: u64) -> ElementId {
    ElementId::new(raw)
}

/// Elements with explicit parents. Hit testing picks the last registered region containing the
/// point, so later regions sit on top.
#[derive(Default)]
pub struct ParentMap {
    parents: HashMap<ElementId, ElementId>,
    regions: Vec<(ElementId, [f64; 4])>,
}
impl ParentMap {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn child(mut self, parent: u64, child: u64) -> Self {
        self.parents.insert(id(child), id(parent));
        self
    }
    /// `element` covers `x..x + w`, `y..y + h`.
    pub fn region(mut self, element: u64, rect: [f64; 4]) -> Self {
        self.regions.push((id(element), rect));
        self
    }
}
impl ElementTree for ParentMap {
    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.parents.get(&element).copied()
    }
    fn hit_test(&self, _: SourceId, position: Point) -> Option<ElementId> {
        self.regions
            .iter()
            .rev()
            .find(|(_, [x, y, w, h])| {
                position.x >= *x && position.x < x + w && position.y >= *y && position.y < y + h
            })
            .map(|(element, _)| *element)
    }
}

/// Collects labelled entries from handlers and observers.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<String>>>);
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
    /// Record `event` in both phases on `element` as `"<event>@<element>:<phase>"`.
    pub fn watch(&self, router: &mut EventRouter, element: u64, event: RoutedEvent) {
        for phase in [Phase::Tunnel, Phase::Bubble] {
            let recorder = self.clone();
            router.add_handler(id(element), event, phase, move |sender, args: &mut InputEventArgs| {
                recorder.push(format!(
                    "{}@{}:{}",
                    args.routed_event().as_ref(),
                    sender.get(),
                    phase.as_ref()
                ));
            });
        }
    }
}

#[derive(Default)]
struct DriverState {
    next_handle: u64,
    live: HashSet<ContextHandle>,
    destroyed: Vec<ContextHandle>,
    locked: HashSet<ContextHandle>,
    lock_attempts: usize,
    fail_locks: bool,
    queued: HashMap<ContextHandle, Vec<PenPacket>>,
}

/// A tablet driver whose behavior is scripted by the test.
#[derive(Default)]
pub struct MockDriver {
    state: Mutex<DriverState>,
}
impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    /// Every lock attempt fails.
    pub fn failing_locks() -> Arc<Self> {
        let driver = Self::default();
        driver.state.lock().unwrap().fail_locks = true;
        Arc::new(driver)
    }
    pub fn lock_attempts(&self) -> usize {
        self.state.lock().unwrap().lock_attempts
    }
    pub fn is_locked(&self, handle: ContextHandle) -> bool {
        self.state.lock().unwrap().locked.contains(&handle)
    }
    pub fn destroyed(&self) -> Vec<ContextHandle> {
        self.state.lock().unwrap().destroyed.clone()
    }
    pub fn queue(&self, packet: PenPacket) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(packet.context)
            .or_default()
            .push(packet);
    }
}
impl TabletDriver for MockDriver {
    fn enumerate_tablets(&self) -> Result<Vec<TabletDeviceInfo>, DriverError> {
        Ok(Vec::new())
    }
    fn create_context(&self, _: WindowId, _: TabletId) -> Result<ContextHandle, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.next_handle += 1;
        let handle = ContextHandle::new(state.next_handle);
        state.live.insert(handle);
        Ok(handle)
    }
    fn destroy_context(&self, handle: ContextHandle) {
        let mut state = self.state.lock().unwrap();
        state.live.remove(&handle);
        state.destroyed.push(handle);
    }
    fn acquire_lock(&self, handle: ContextHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.lock_attempts += 1;
        if state.fail_locks {
            return Err(DriverError::Locked(handle));
        }
        state.locked.insert(handle);
        Ok(())
    }
    fn release_lock(&self, handle: ContextHandle) {
        self.state.lock().unwrap().locked.remove(&handle);
    }
    fn refresh_styluses(&self, _: TabletId) -> Result<Vec<StylusDeviceInfo>, DriverError> {
        Ok(Vec::new())
    }
    fn poll(&self, handle: ContextHandle) -> Result<Vec<PenPacket>, DriverError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .queued
            .remove(&handle)
            .unwrap_or_default())
    }
}
