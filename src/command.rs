//! # Commands
//!
//! A [`RoutedCommand`] is an identity (name and owner) that elements opt into handling through
//! [`CommandBinding`]s. Executing a command raises `Executed` on a target element: a preview
//! pass down from the root, then a bubble pass back up. The first binding for the command met
//! along the way runs and marks the event handled. `CanExecute` travels the same way but only
//! ever asks bindings whether they *could* run.
//!
//! Key gestures bound through [`InputBinding`]s, or attached to the command itself, turn an
//! unhandled `KeyDown` into an execution. The input manager performs that translation.

use std::{any::Any, borrow::Cow, collections::HashMap, sync::Arc};

use smallvec::SmallVec;
use tracing::debug;

use crate::{
    events::{ArgsHeader, InputArgs, InputEventArgs, KeyEventArgs, Phase, RoutedEvent},
    keyboard::{ModifierKeys, VirtualKey},
    report::Timestamp,
    route::{ElementTree, EventRoute, EventRouter},
    ElementId,
};

/// Optional payload passed to a command's handlers. Compared by identity.
pub type CommandParameter = Arc<dyn Any + Send + Sync>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("command must not be null")]
    NullCommand,
}

/// A key plus the modifiers that must be held with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyGesture {
    pub key: VirtualKey,
    pub modifiers: ModifierKeys,
}
impl KeyGesture {
    #[must_use]
    pub const fn new(key: VirtualKey, modifiers: ModifierKeys) -> Self {
        Self { key, modifiers }
    }
    #[must_use]
    pub fn matches(&self, args: &KeyEventArgs) -> bool {
        args.key == self.key && args.modifiers == self.modifiers
    }
}

struct CommandInfo {
    name: Cow<'static, str>,
    owner: &'static str,
    gestures: SmallVec<[KeyGesture; 2]>,
}

/// See [module level docs](`crate::command`) for details.
///
/// Cheap to clone. Two commands are equal when their name and owner are.
#[derive(Clone)]
pub struct RoutedCommand(Arc<CommandInfo>);
impl RoutedCommand {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, owner: &'static str) -> Self {
        Self::with_gestures(name, owner, std::iter::empty())
    }
    /// A command that also executes when one of `gestures` is pressed over an element binding it.
    #[must_use]
    pub fn with_gestures(
        name: impl Into<Cow<'static, str>>,
        owner: &'static str,
        gestures: impl IntoIterator<Item = KeyGesture>,
    ) -> Self {
        Self(Arc::new(CommandInfo {
            name: name.into(),
            owner,
            gestures: gestures.into_iter().collect(),
        }))
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }
    #[must_use]
    pub fn owner(&self) -> &'static str {
        self.0.owner
    }
    #[must_use]
    pub fn gestures(&self) -> &[KeyGesture] {
        &self.0.gestures
    }
}
impl PartialEq for RoutedCommand {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.name == other.0.name && self.0.owner == other.0.owner)
    }
}
impl Eq for RoutedCommand {}
impl std::hash::Hash for RoutedCommand {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
        self.0.owner.hash(state);
    }
}
impl std::fmt::Debug for RoutedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0.owner, self.0.name)
    }
}

/// `Executed`. The command and parameter cannot change while the event travels.
#[derive(Clone, Debug)]
pub struct ExecutedRoutedEventArgs {
    pub(crate) header: ArgsHeader,
    command: RoutedCommand,
    parameter: Option<CommandParameter>,
}
impl ExecutedRoutedEventArgs {
    #[must_use]
    pub fn new(
        command: &RoutedCommand,
        parameter: Option<CommandParameter>,
        target: ElementId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            header: ArgsHeader::new(RoutedEvent::Executed, None, timestamp, Some(target)),
            command: command.clone(),
            parameter,
        }
    }
    #[must_use]
    pub fn command(&self) -> &RoutedCommand {
        &self.command
    }
    #[must_use]
    pub fn parameter(&self) -> Option<&CommandParameter> {
        self.parameter.as_ref()
    }
}

/// `CanExecute`. Handlers answer through [`Self::set_can_execute`].
#[derive(Clone, Debug)]
pub struct CanExecuteRoutedEventArgs {
    pub(crate) header: ArgsHeader,
    command: RoutedCommand,
    parameter: Option<CommandParameter>,
    can_execute: bool,
    /// Keep looking further up the route even though a binding answered.
    pub continue_routing: bool,
}
impl CanExecuteRoutedEventArgs {
    #[must_use]
    pub fn new(
        command: &RoutedCommand,
        parameter: Option<CommandParameter>,
        target: ElementId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            header: ArgsHeader::new(RoutedEvent::CanExecute, None, timestamp, Some(target)),
            command: command.clone(),
            parameter,
            can_execute: false,
            continue_routing: false,
        }
    }
    #[must_use]
    pub fn command(&self) -> &RoutedCommand {
        &self.command
    }
    #[must_use]
    pub fn parameter(&self) -> Option<&CommandParameter> {
        self.parameter.as_ref()
    }
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.can_execute
    }
    pub fn set_can_execute(&mut self, can_execute: bool) {
        self.can_execute = can_execute;
    }
}

type ExecutedHandler = Box<dyn FnMut(ElementId, &mut ExecutedRoutedEventArgs)>;
type CanExecuteHandler = Box<dyn FnMut(ElementId, &mut CanExecuteRoutedEventArgs)>;

/// Attaches handlers for one command to an element.
pub struct CommandBinding {
    command: RoutedCommand,
    executed: Option<ExecutedHandler>,
    preview_executed: Option<ExecutedHandler>,
    can_execute: Option<CanExecuteHandler>,
}
impl CommandBinding {
    #[must_use]
    pub fn new(command: RoutedCommand) -> Self {
        Self {
            command,
            executed: None,
            preview_executed: None,
            can_execute: None,
        }
    }
    #[must_use]
    pub fn on_executed(
        mut self,
        handler: impl FnMut(ElementId, &mut ExecutedRoutedEventArgs) + 'static,
    ) -> Self {
        self.executed = Some(Box::new(handler));
        self
    }
    #[must_use]
    pub fn on_preview_executed(
        mut self,
        handler: impl FnMut(ElementId, &mut ExecutedRoutedEventArgs) + 'static,
    ) -> Self {
        self.preview_executed = Some(Box::new(handler));
        self
    }
    /// Without a `CanExecute` handler, a binding with an `Executed` handler always reports
    /// that it can execute.
    #[must_use]
    pub fn on_can_execute(
        mut self,
        handler: impl FnMut(ElementId, &mut CanExecuteRoutedEventArgs) + 'static,
    ) -> Self {
        self.can_execute = Some(Box::new(handler));
        self
    }
    #[must_use]
    pub fn command(&self) -> &RoutedCommand {
        &self.command
    }
    fn executed(&mut self, sender: ElementId, phase: Phase, args: &mut ExecutedRoutedEventArgs) {
        let handler = match phase {
            Phase::Tunnel => self.preview_executed.as_mut(),
            Phase::Bubble | Phase::Direct => self.executed.as_mut(),
        };
        if let Some(handler) = handler {
            handler(sender, args);
            args.set_handled(true);
        }
    }
    fn query(&mut self, sender: ElementId, phase: Phase, args: &mut CanExecuteRoutedEventArgs) {
        if phase == Phase::Tunnel {
            return;
        }
        if let Some(handler) = self.can_execute.as_mut() {
            handler(sender, args);
            if args.can_execute() && !args.continue_routing {
                args.set_handled(true);
            }
        } else if self.executed.is_some() {
            args.set_can_execute(true);
            args.set_handled(true);
        }
    }
}
impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("command", &self.command)
            .field("executed", &self.executed.is_some())
            .field("preview_executed", &self.preview_executed.is_some())
            .field("can_execute", &self.can_execute.is_some())
            .finish()
    }
}

/// Binds a key gesture on an element to a command.
#[derive(Clone, Debug)]
pub struct InputBinding {
    pub gesture: KeyGesture,
    pub command: RoutedCommand,
    pub parameter: Option<CommandParameter>,
}

/// Command and input bindings per element.
#[derive(Default, Debug)]
pub struct CommandBindings {
    commands: HashMap<ElementId, Vec<CommandBinding>>,
    inputs: HashMap<ElementId, Vec<InputBinding>>,
}
impl CommandBindings {
    pub(crate) fn clear_element(&mut self, element: ElementId) {
        self.commands.remove(&element);
        self.inputs.remove(&element);
    }
    /// Class handling for command events, run before instance handlers on each element.
    pub(crate) fn invoke(&mut self, element: ElementId, phase: Phase, args: &mut InputEventArgs) {
        if args.handled() {
            return;
        }
        let Some(bindings) = self.commands.get_mut(&element) else {
            return;
        };
        match args {
            InputEventArgs::Executed(args) => {
                if let Some(binding) = bindings.iter_mut().find(|b| b.command == args.command) {
                    binding.executed(element, phase, args);
                }
            }
            InputEventArgs::CanExecute(args) => {
                if let Some(binding) = bindings.iter_mut().find(|b| b.command == args.command) {
                    binding.query(element, phase, args);
                }
            }
            _ => {}
        }
    }
    /// The first command bound to `args`' gesture on `element`, either explicitly or through the
    /// gestures of a command the element has a binding for.
    fn gesture_command(
        &self,
        element: ElementId,
        args: &KeyEventArgs,
    ) -> Option<(RoutedCommand, Option<CommandParameter>)> {
        if let Some(binding) = self
            .inputs
            .get(&element)
            .and_then(|inputs| inputs.iter().find(|input| input.gesture.matches(args)))
        {
            return Some((binding.command.clone(), binding.parameter.clone()));
        }
        self.commands.get(&element).and_then(|bindings| {
            bindings
                .iter()
                .find(|binding| binding.command.gestures().iter().any(|g| g.matches(args)))
                .map(|binding| (binding.command.clone(), None))
        })
    }
}

/// Anything that can invoke a command against a target, such as a button or menu item.
pub trait CommandSource {
    fn command(&self) -> Option<&RoutedCommand>;
    fn command_parameter(&self) -> Option<CommandParameter> {
        None
    }
    /// Where to raise the command. `None` uses the element with keyboard focus.
    fn command_target(&self) -> Option<ElementId> {
        None
    }
}

/// # Commands
impl EventRouter {
    pub fn add_command_binding(&mut self, element: ElementId, binding: CommandBinding) {
        self.commands.commands.entry(element).or_default().push(binding);
    }
    pub fn add_input_binding(&mut self, element: ElementId, binding: InputBinding) {
        self.commands.inputs.entry(element).or_default().push(binding);
    }
    /// Raise `Executed` for `command` on `target`, returning whether a binding handled it.
    /// # Errors
    /// Fails without raising anything if `command` is `None`.
    pub fn execute<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        command: Option<&RoutedCommand>,
        parameter: Option<CommandParameter>,
        target: ElementId,
        timestamp: Timestamp,
    ) -> Result<bool, CommandError> {
        let command = command.ok_or(CommandError::NullCommand)?;
        debug!(?command, ?target, "executing command");
        let mut args: InputEventArgs =
            ExecutedRoutedEventArgs::new(command, parameter, target, timestamp).into();
        Ok(self.raise(tree, &mut args))
    }
    /// Ask the bindings along the route of `target` whether `command` can run. Runs no command.
    /// # Errors
    /// Fails without raising anything if `command` is `None`.
    pub fn can_execute<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        command: Option<&RoutedCommand>,
        parameter: Option<CommandParameter>,
        target: ElementId,
        timestamp: Timestamp,
    ) -> Result<bool, CommandError> {
        let command = command.ok_or(CommandError::NullCommand)?;
        let mut args: InputEventArgs =
            CanExecuteRoutedEventArgs::new(command, parameter, target, timestamp).into();
        self.raise(tree, &mut args);
        Ok(matches!(args, InputEventArgs::CanExecute(ref args) if args.can_execute()))
    }
    /// Turn a key press into a command, walking from the key's target to the root.
    /// Returns whether a command ran.
    pub(crate) fn translate_key<T: ElementTree + ?Sized>(
        &mut self,
        tree: &T,
        args: &KeyEventArgs,
    ) -> bool {
        let Some(source) = args.source() else {
            return false;
        };
        let found = EventRoute::build(tree, source)
            .iter_bubbling()
            .find_map(|element| self.commands.gesture_command(element, args));
        let Some((command, parameter)) = found else {
            return false;
        };
        let timestamp = args.timestamp();
        // Infallible: the command is present.
        let allowed = self
            .can_execute(tree, Some(&command), parameter.clone(), source, timestamp)
            .unwrap_or(false);
        if !allowed {
            debug!(?command, "gesture matched but command cannot execute");
            return false;
        }
        self.execute(tree, Some(&command), parameter, source, timestamp)
            .unwrap_or(false)
    }
}
