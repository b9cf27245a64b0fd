//! # The input pipeline
//!
//! [`InputManager::process_input`] takes one validated report through the stages below. Every
//! event created along the way, such as the key event promoted from a keyboard report, is
//! staged and goes through the same stages before `process_input` returns.
//!
//! 1. **Pre-notify**: observers inspect the event and may annotate its staging item.
//! 2. **Pre-process**: observers may [cancel](PreProcessInputEventArgs::cancel) the event.
//!    Cancellation is cooperative: later observers still run.
//! 3. **Routing**: unless canceled, the event is raised along the element tree.
//! 4. **Post-process**: unless canceled, devices promote raw reports into typed events and
//!    unhandled key presses are translated into commands. Then observers run, and may
//!    [push](ProcessInputEventArgs::push_input) further events.
//! 5. **Post-notify**: observers see the final state of the event.
//!
//! Promoted and pushed events start with a copy of the annotations of the item they came from.
//!
//! Handlers and observers that panic unwind straight through to the caller. Whatever was left
//! staged is discarded at the start of the next call.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::{
    command::{CommandError, CommandParameter, CommandSource, RoutedCommand},
    events::{
        InputArgs, InputEventArgs, InputReportEventArgs, KeyboardFocusChangedEventArgs,
        MouseEventArgs, RoutedEvent, TextCompositionEventArgs,
    },
    keyboard::KeyboardDevice,
    mouse::{CaptureMode, MouseDevice},
    report::{InputReport, RawUiStateTargets, ReportPayload, Timestamp},
    route::{ElementTree, EventRouter},
    staging::{Annotation, AnnotationKey, StagingItem},
    stylus::StylusLogic,
    system::SystemInputState,
    ElementId,
};

/// Identifies a registered stage observer, for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Handed to pre-notify and post-notify observers.
pub struct NotifyInputEventArgs<'a> {
    item: &'a mut StagingItem,
}
impl NotifyInputEventArgs<'_> {
    #[must_use]
    pub fn staging_item(&self) -> &StagingItem {
        &*self.item
    }
    /// Annotations set here are carried to every event promoted from this one.
    pub fn staging_item_mut(&mut self) -> &mut StagingItem {
        &mut *self.item
    }
    #[must_use]
    pub fn input(&self) -> &InputEventArgs {
        self.item.input()
    }
}

/// Handed to pre-process observers.
pub struct PreProcessInputEventArgs<'a> {
    notify: NotifyInputEventArgs<'a>,
    canceled: bool,
}
impl PreProcessInputEventArgs<'_> {
    /// Skip routing and promotion of this event. Remaining observers of every stage still run.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }
    #[must_use]
    pub fn canceled(&self) -> bool {
        self.canceled
    }
}
impl<'a> std::ops::Deref for PreProcessInputEventArgs<'a> {
    type Target = NotifyInputEventArgs<'a>;
    fn deref(&self) -> &Self::Target {
        &self.notify
    }
}
impl std::ops::DerefMut for PreProcessInputEventArgs<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.notify
    }
}

/// Handed to post-process observers.
pub struct ProcessInputEventArgs<'a> {
    notify: NotifyInputEventArgs<'a>,
    pushed: &'a mut Vec<InputEventArgs>,
    canceled: bool,
}
impl ProcessInputEventArgs<'_> {
    /// Stage `input` to be processed right after this event, ahead of anything staged before.
    pub fn push_input(&mut self, input: impl Into<InputEventArgs>) {
        self.pushed.push(input.into());
    }
    /// Events staged so far from this one, including device promotions.
    #[must_use]
    pub fn pushed(&self) -> &[InputEventArgs] {
        self.pushed.as_slice()
    }
    #[must_use]
    pub fn canceled(&self) -> bool {
        self.canceled
    }
}
impl<'a> std::ops::Deref for ProcessInputEventArgs<'a> {
    type Target = NotifyInputEventArgs<'a>;
    fn deref(&self) -> &Self::Target {
        &self.notify
    }
}
impl std::ops::DerefMut for ProcessInputEventArgs<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.notify
    }
}

type NotifyObserver = Box<dyn FnMut(&mut NotifyInputEventArgs<'_>)>;
type PreProcessObserver = Box<dyn FnMut(&mut PreProcessInputEventArgs<'_>)>;
type PostProcessObserver = Box<dyn FnMut(&mut ProcessInputEventArgs<'_>)>;

#[derive(Default)]
struct Observers {
    pre_notify: Vec<(ObserverId, NotifyObserver)>,
    pre_process: Vec<(ObserverId, PreProcessObserver)>,
    post_process: Vec<(ObserverId, PostProcessObserver)>,
    post_notify: Vec<(ObserverId, NotifyObserver)>,
}
impl Observers {
    fn remove(&mut self, id: ObserverId) -> bool {
        fn remove_from<T>(list: &mut Vec<(ObserverId, T)>, id: ObserverId) -> bool {
            let before = list.len();
            list.retain(|(observer, _)| *observer != id);
            list.len() != before
        }
        remove_from(&mut self.pre_notify, id)
            || remove_from(&mut self.pre_process, id)
            || remove_from(&mut self.post_process, id)
            || remove_from(&mut self.post_notify, id)
    }
}

/// See [module level docs](`crate::manager`) for details.
///
/// Create with a [`Builder`](crate::Builder).
pub struct InputManager {
    pub(crate) keyboard: KeyboardDevice,
    pub(crate) mouse: MouseDevice,
    pub(crate) stylus: StylusLogic,
    pub(crate) router: EventRouter,
    pub(crate) system: Box<dyn SystemInputState>,
    observers: Observers,
    next_observer: u64,
    staging: Vec<StagingItem>,
    free_items: Vec<StagingItem>,
    pub(crate) staging_pool_size: usize,
    pub(crate) ui_state: RawUiStateTargets,
    pub(crate) app_commands: HashMap<i32, RoutedCommand>,
    last_timestamp: Timestamp,
}

/// # Devices and state
impl InputManager {
    pub(crate) fn with_system(system: Box<dyn SystemInputState>) -> Self {
        Self {
            keyboard: KeyboardDevice::new(),
            mouse: MouseDevice::new(),
            stylus: StylusLogic::new(),
            router: EventRouter::new(),
            system,
            observers: Observers::default(),
            next_observer: 0,
            staging: Vec::new(),
            free_items: Vec::new(),
            staging_pool_size: 0,
            ui_state: RawUiStateTargets::empty(),
            app_commands: HashMap::new(),
            last_timestamp: Timestamp::default(),
        }
    }
    #[must_use]
    pub fn keyboard(&self) -> &KeyboardDevice {
        &self.keyboard
    }
    #[must_use]
    pub fn mouse(&self) -> &MouseDevice {
        &self.mouse
    }
    #[must_use]
    pub fn stylus(&self) -> &StylusLogic {
        &self.stylus
    }
    /// For stylus capture.
    pub fn stylus_mut(&mut self) -> &mut StylusLogic {
        &mut self.stylus
    }
    #[must_use]
    pub fn router(&self) -> &EventRouter {
        &self.router
    }
    /// Register handlers and bindings here.
    pub fn router_mut(&mut self) -> &mut EventRouter {
        &mut self.router
    }
    #[must_use]
    pub fn system(&self) -> &dyn SystemInputState {
        &*self.system
    }
    /// Keyboard-cue visibility flags, as last set by a UI state report.
    #[must_use]
    pub fn ui_state(&self) -> RawUiStateTargets {
        self.ui_state
    }
    /// Execute `command` when an app command report carries `code`. Returns the replaced mapping.
    pub fn map_app_command(&mut self, code: i32, command: RoutedCommand) -> Option<RoutedCommand> {
        self.app_commands.insert(code, command)
    }
    /// Timestamp of the most recent report, used for events the manager synthesizes.
    #[must_use]
    pub fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }
}

/// # Observers
impl InputManager {
    fn next_observer_id(&mut self) -> ObserverId {
        self.next_observer += 1;
        ObserverId(self.next_observer)
    }
    pub fn add_pre_notify(
        &mut self,
        observer: impl FnMut(&mut NotifyInputEventArgs<'_>) + 'static,
    ) -> ObserverId {
        let id = self.next_observer_id();
        self.observers.pre_notify.push((id, Box::new(observer)));
        id
    }
    pub fn add_pre_process(
        &mut self,
        observer: impl FnMut(&mut PreProcessInputEventArgs<'_>) + 'static,
    ) -> ObserverId {
        let id = self.next_observer_id();
        self.observers.pre_process.push((id, Box::new(observer)));
        id
    }
    pub fn add_post_process(
        &mut self,
        observer: impl FnMut(&mut ProcessInputEventArgs<'_>) + 'static,
    ) -> ObserverId {
        let id = self.next_observer_id();
        self.observers.post_process.push((id, Box::new(observer)));
        id
    }
    pub fn add_post_notify(
        &mut self,
        observer: impl FnMut(&mut NotifyInputEventArgs<'_>) + 'static,
    ) -> ObserverId {
        let id = self.next_observer_id();
        self.observers.post_notify.push((id, Box::new(observer)));
        id
    }
    /// Returns whether an observer was removed.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }
}

/// # Processing
impl InputManager {
    /// Run `report` and everything promoted from it through the pipeline.
    ///
    /// Returns whether any of those events was handled.
    pub fn process_input<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        report: InputReport,
    ) -> bool {
        self.last_timestamp = self.last_timestamp.max(report.timestamp());
        self.process_args(tree, InputReportEventArgs::new(report))
    }
    /// Run an already typed event through the pipeline, as if a device had promoted it.
    pub fn process_args<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        input: impl Into<InputEventArgs>,
    ) -> bool {
        if !self.staging.is_empty() {
            warn!(
                stale = self.staging.len(),
                "discarding input left staged by an interrupted pass"
            );
            let stale = std::mem::take(&mut self.staging);
            for item in stale {
                self.recycle(item);
            }
        }
        let item = self.staging_item(input.into(), None);
        self.staging.push(item);
        let mut handled = false;
        while let Some(mut item) = self.staging.pop() {
            handled |= self.run_stages(tree, &mut item);
            self.recycle(item);
        }
        handled
    }
    fn staging_item(
        &mut self,
        input: InputEventArgs,
        promote: Option<&StagingItem>,
    ) -> StagingItem {
        match self.free_items.pop() {
            Some(mut item) => {
                item.reset(input, promote);
                item
            }
            None => StagingItem::promoted(input, promote),
        }
    }
    fn recycle(&mut self, item: StagingItem) {
        if self.free_items.len() < self.staging_pool_size {
            self.free_items.push(item);
        }
    }
    fn run_stages<T: ElementTree + ?Sized>(&mut self, tree: &T, item: &mut StagingItem) -> bool {
        let event = item.input().routed_event();
        trace!(?event, "pre-notify");
        for (_, observer) in &mut self.observers.pre_notify {
            observer(&mut NotifyInputEventArgs { item: &mut *item });
        }

        trace!(?event, "pre-process");
        let mut args = PreProcessInputEventArgs {
            notify: NotifyInputEventArgs { item: &mut *item },
            canceled: false,
        };
        for (_, observer) in &mut self.observers.pre_process {
            observer(&mut args);
        }
        let canceled = args.canceled;

        let mut pushed = Vec::new();
        if canceled {
            debug!(?event, "input canceled, skipping routing");
        } else {
            self.router.raise(tree, item.input_mut());
            self.promote(tree, item, &mut pushed);
        }

        trace!(?event, canceled, "post-process");
        let mut args = ProcessInputEventArgs {
            notify: NotifyInputEventArgs { item: &mut *item },
            pushed: &mut pushed,
            canceled,
        };
        for (_, observer) in &mut self.observers.post_process {
            observer(&mut args);
        }

        trace!(?event, "post-notify");
        for (_, observer) in &mut self.observers.post_notify {
            observer(&mut NotifyInputEventArgs { item: &mut *item });
        }

        // Reversed, so the first pushed is the next popped.
        for input in pushed.into_iter().rev() {
            let promoted = self.staging_item(input, Some(&*item));
            self.staging.push(promoted);
        }
        item.input().handled()
    }
    /// Built-in post-processing: device promotion and command translation.
    fn promote<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        item: &mut StagingItem,
        pushed: &mut Vec<InputEventArgs>,
    ) {
        let start = pushed.len();
        match item.input() {
            InputEventArgs::Report(args) => {
                let report = args.report().clone();
                self.promote_report(tree, item, &report, pushed);
            }
            InputEventArgs::Key(args)
                if args.routed_event() == RoutedEvent::KeyDown && !args.handled() =>
            {
                let args = args.clone();
                if self.router.translate_key(tree, &args) {
                    item.input_mut().set_handled(true);
                }
            }
            _ => {}
        }
        if pushed.len() > start {
            trace!(promoted = pushed.len() - start, "input promoted");
        }
    }
    fn promote_report<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        item: &mut StagingItem,
        report: &InputReport,
        pushed: &mut Vec<InputEventArgs>,
    ) {
        item.set_data(AnnotationKey::PromotedFrom, Annotation::Input(report.input_type()));
        match report.payload() {
            ReportPayload::None => {}
            ReportPayload::Keyboard(raw) => {
                item.set_data(AnnotationKey::ScanCode, Annotation::Integer(raw.scan_code.into()));
                item.set_data(AnnotationKey::ExtendedKey, Annotation::Flag(raw.is_extended_key));
                item.set_data(AnnotationKey::SystemKey, Annotation::Flag(raw.is_system_key));
                pushed.extend(
                    self.keyboard
                        .promote(report, raw, &*self.system)
                        .into_iter()
                        .map(InputEventArgs::from),
                );
            }
            ReportPayload::Mouse(raw) => {
                pushed.extend(self.mouse.promote(tree, report, raw, &*self.system));
                item.set_data(
                    AnnotationKey::DirectlyOver,
                    Annotation::Element(self.mouse.directly_over()),
                );
            }
            ReportPayload::Stylus(raw) => {
                item.set_data(AnnotationKey::StylusDevice, Annotation::Stylus(raw.stylus));
                pushed.extend(
                    self.stylus
                        .promote(tree, report, raw)
                        .into_iter()
                        .map(InputEventArgs::from),
                );
            }
            ReportPayload::Text(raw) => {
                if let Some(target) = self.keyboard.focused_element() {
                    pushed.push(
                        TextCompositionEventArgs::new(
                            target,
                            report.timestamp(),
                            raw.character.to_string(),
                            raw.flags,
                        )
                        .into(),
                    );
                }
            }
            ReportPayload::UiState(raw) => {
                self.ui_state = raw.targets.apply(raw.action, self.ui_state);
                debug!(ui_state = ?self.ui_state, "UI state changed");
            }
            ReportPayload::AppCommand(raw) => {
                let Some(command) = self.app_commands.get(&raw.command).cloned() else {
                    trace!(code = raw.command, "unmapped app command");
                    return;
                };
                let Some(target) = self.keyboard.focused_element() else {
                    return;
                };
                // Infallible: the command is present.
                let executed = self
                    .router
                    .execute(tree, Some(&command), None, target, report.timestamp())
                    .unwrap_or(false);
                if executed {
                    item.input_mut().set_handled(true);
                }
            }
        }
    }
}

/// # Focus and capture
impl InputManager {
    /// Move keyboard focus to `element`, raising `LostKeyboardFocus` on the old element and
    /// `GotKeyboardFocus` on the new one, then reconciling key state with the system.
    ///
    /// Returns whether focus changed.
    pub fn focus<T: ElementTree + ?Sized>(&mut self, tree: &T, element: Option<ElementId>) -> bool {
        let old = self.keyboard.set_focus(element);
        if old == element {
            return false;
        }
        debug!(?old, new = ?element, "keyboard focus changed");
        let timestamp = self.last_timestamp;
        if let Some(old) = old {
            self.process_args(
                tree,
                KeyboardFocusChangedEventArgs::new(
                    RoutedEvent::LostKeyboardFocus,
                    old,
                    timestamp,
                    Some(old),
                    element,
                ),
            );
        }
        if let Some(new) = element {
            self.process_args(
                tree,
                KeyboardFocusChangedEventArgs::new(
                    RoutedEvent::GotKeyboardFocus,
                    new,
                    timestamp,
                    old,
                    element,
                ),
            );
        }
        self.keyboard.reconcile(&*self.system);
        true
    }
    /// Capture the mouse to `element`. `None` releases capture.
    ///
    /// The element losing capture receives `LostMouseCapture`.
    pub fn capture_mouse<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        element: Option<ElementId>,
        mode: CaptureMode,
    ) {
        let old = self.mouse.set_capture(element, mode);
        if let Some(old) = old.filter(|old| Some(*old) != self.mouse.captured()) {
            let args = MouseEventArgs::new(
                RoutedEvent::LostMouseCapture,
                old,
                self.last_timestamp,
                self.mouse.position(),
            );
            self.process_args(tree, args);
        }
    }
}

/// # Commands
impl InputManager {
    /// Execute `command` on `target`, or the focused element if `None`.
    ///
    /// Returns whether a binding handled it. Without a target nothing is raised.
    /// # Errors
    /// Fails before raising anything if `command` is `None`.
    pub fn execute<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        command: Option<&RoutedCommand>,
        parameter: Option<CommandParameter>,
        target: Option<ElementId>,
    ) -> Result<bool, CommandError> {
        let command = command.ok_or(CommandError::NullCommand)?;
        let Some(target) = target.or(self.keyboard.focused_element()) else {
            return Ok(false);
        };
        self.router
            .execute(tree, Some(command), parameter, target, self.last_timestamp)
    }
    /// Ask whether `command` can execute on `target`, or the focused element if `None`.
    /// # Errors
    /// Fails before raising anything if `command` is `None`.
    pub fn can_execute<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        command: Option<&RoutedCommand>,
        parameter: Option<CommandParameter>,
        target: Option<ElementId>,
    ) -> Result<bool, CommandError> {
        let command = command.ok_or(CommandError::NullCommand)?;
        let Some(target) = target.or(self.keyboard.focused_element()) else {
            return Ok(false);
        };
        self.router
            .can_execute(tree, Some(command), parameter, target, self.last_timestamp)
    }
    /// Execute a source's command with its parameter against its target, if it can execute.
    /// # Errors
    /// Fails if the source has no command.
    pub fn execute_source<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        source: &dyn CommandSource,
    ) -> Result<bool, CommandError> {
        let command = source.command().ok_or(CommandError::NullCommand)?;
        let parameter = source.command_parameter();
        let target = source.command_target();
        if !self.can_execute(tree, Some(command), parameter.clone(), target)? {
            return Ok(false);
        }
        self.execute(tree, Some(command), parameter, target)
    }
}

impl std::fmt::Debug for InputManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputManager")
            .field("keyboard", &self.keyboard)
            .field("mouse", &self.mouse)
            .field("stylus", &self.stylus)
            .field("router", &self.router)
            .field("staged", &self.staging.len())
            .field("ui_state", &self.ui_state)
            .finish_non_exhaustive()
    }
}
