//! Pull-based access to the live OS input state.
//!
//! Devices keep their own picture of the hardware, built from the reports they have seen. That
//! picture goes stale whenever input is delivered elsewhere (another window held focus, a key
//! was released while the app was inactive). [`SystemInputState`] is the escape hatch used to
//! reconcile, queried at call time and never cached here.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::{
    keyboard::{KeyStates, VirtualKey},
    mouse::MouseButton,
};

/// What the devices need to know about the OS, answered from live state.
pub trait SystemInputState {
    /// Current state of `key` according to the OS.
    fn key_states(&self, key: VirtualKey) -> KeyStates;
    /// Whether `button` is physically held right now.
    fn button_pressed(&self, button: MouseButton) -> bool;
    /// The longest gap between two presses that still counts as a multi-click.
    fn double_click_time(&self) -> Duration {
        Duration::from_millis(500)
    }
    /// Width and height of the box a multi-click must stay within.
    fn double_click_size(&self) -> (f64, f64) {
        (4.0, 4.0)
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    keys: HashMap<VirtualKey, KeyStates>,
    buttons: HashSet<MouseButton>,
    double_click_time: Option<Duration>,
    double_click_size: Option<(f64, f64)>,
}

/// An in-memory [`SystemInputState`], for hosts that track OS state themselves and for tests.
///
/// Clones share the same state, so one can be handed to an [`InputManager`](crate::InputManager)
/// and another kept to update it.
#[derive(Debug, Default, Clone)]
pub struct SnapshotState(Arc<Mutex<Snapshot>>);
impl SnapshotState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    fn with<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
    pub fn set_key(&self, key: VirtualKey, states: KeyStates) {
        self.with(|snapshot| {
            if states.is_empty() {
                snapshot.keys.remove(&key);
            } else {
                snapshot.keys.insert(key, states);
            }
        });
    }
    pub fn set_button(&self, button: MouseButton, pressed: bool) {
        self.with(|snapshot| {
            if pressed {
                snapshot.buttons.insert(button);
            } else {
                snapshot.buttons.remove(&button);
            }
        });
    }
    pub fn set_double_click(&self, time: Duration, size: (f64, f64)) {
        self.with(|snapshot| {
            snapshot.double_click_time = Some(time);
            snapshot.double_click_size = Some(size);
        });
    }
}
impl SystemInputState for SnapshotState {
    fn key_states(&self, key: VirtualKey) -> KeyStates {
        self.with(|snapshot| snapshot.keys.get(&key).copied().unwrap_or_default())
    }
    fn button_pressed(&self, button: MouseButton) -> bool {
        self.with(|snapshot| snapshot.buttons.contains(&button))
    }
    fn double_click_time(&self) -> Duration {
        self.with(|snapshot| snapshot.double_click_time)
            .unwrap_or(Duration::from_millis(500))
    }
    fn double_click_size(&self) -> (f64, f64) {
        self.with(|snapshot| snapshot.double_click_size)
            .unwrap_or((4.0, 4.0))
    }
}
