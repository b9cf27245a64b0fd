//! Builder-style configuration for an [`InputManager`].
//!
//! For a default configuration, `Builder::new().build(system)` is all you need!

use std::collections::HashMap;

use crate::{
    command::RoutedCommand, report::RawUiStateTargets, system::SystemInputState, InputManager,
};

/// Pre-construction configuration for an [`InputManager`].
#[derive(Debug)]
pub struct Builder {
    staging_pool_size: usize,
    app_commands: HashMap<i32, RoutedCommand>,
    ui_state: RawUiStateTargets,
}
impl Default for Builder {
    fn default() -> Self {
        Self {
            staging_pool_size: 8,
            app_commands: HashMap::new(),
            ui_state: RawUiStateTargets::empty(),
        }
    }
}

/// # Configuration
impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// How many finished staging items are kept for reuse. Defaults to 8.
    #[must_use]
    pub fn staging_pool_size(mut self, size: usize) -> Self {
        self.staging_pool_size = size;
        self
    }
    /// Execute `command` on the focused element when an app command report carries `code`.
    #[must_use]
    pub fn app_command(mut self, code: i32, command: RoutedCommand) -> Self {
        self.app_commands.insert(code, command);
        self
    }
    /// Keyboard-cue flags in effect before the first UI state report.
    #[must_use]
    pub fn ui_state(mut self, targets: RawUiStateTargets) -> Self {
        self.ui_state = targets;
        self
    }
}
/// # Finishing
impl Builder {
    /// Build a manager reading live OS state from `system`.
    #[must_use]
    pub fn build(self, system: impl SystemInputState + 'static) -> InputManager {
        let mut manager = InputManager::with_system(Box::new(system));
        manager.staging_pool_size = self.staging_pool_size;
        manager.app_commands = self.app_commands;
        manager.ui_state = self.ui_state;
        manager
    }
}
