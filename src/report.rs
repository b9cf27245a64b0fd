//! # Input reports
//!
//! An [`InputReport`] is the immutable record of one hardware event as delivered by a platform
//! input source. Reports are validated when they are built: a report that exists is well formed,
//! so the pipeline never has to second-guess one.
//!
//! Platform layers usually hold raw integers (message parameters, driver flags). The
//! `try_from_raw` family of constructors take those directly and reject out-of-range values
//! with a [`ReportError`] rather than clamping them.

pub mod raw;

use crate::SourceId;
pub use raw::{
    RawAppCommandInput, RawKeyboardActions, RawKeyboardInput, RawMouseActions, RawMouseInput,
    RawStylusActions, RawStylusInput, RawTextFlags, RawTextInput, RawUiStateAction,
    RawUiStateInput, RawUiStateTargets,
};

/// Which class of device produced a report.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::FromRepr,
    strum::EnumCount,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[repr(u8)]
pub enum InputType {
    Keyboard,
    Mouse,
    Stylus,
    Hid,
    Text,
    Command,
}

/// Whether the source was in the foreground when the report was generated.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::FromRepr, strum::EnumCount, strum::AsRefStr,
)]
#[repr(u8)]
pub enum InputMode {
    Foreground,
    /// Input delivered to a background sink, for example while another window holds focus.
    Sink,
}

/// An opaque, monotonic timestamp with unspecified epoch.
///
/// Subtract two timestamps to get the duration between them.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Timestamp(pub std::time::Duration);
impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(std::time::Duration::from_millis(millis))
    }
    /// Get the time since the unspecified epoch.
    #[must_use]
    pub fn since_arbitrary(self) -> std::time::Duration {
        self.0
    }
}
impl std::ops::Sub for Timestamp {
    type Output = std::time::Duration;
    fn sub(self, rhs: Self) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("input report has no source")]
    MissingSource,
    #[error("input type {0} is out of range")]
    InputTypeOutOfRange(u8),
    #[error("input mode {0} is out of range")]
    InputModeOutOfRange(u8),
    #[error("invalid raw keyboard actions {0:#x}")]
    InvalidKeyboardActions(u32),
    #[error("invalid raw mouse actions {0:#x}")]
    InvalidMouseActions(u32),
    #[error("invalid raw stylus actions {0:#x}")]
    InvalidStylusActions(u32),
    #[error("stylus report carries no points")]
    EmptyStylusPoints,
    #[error("invalid raw text flags {0:#x}")]
    InvalidTextFlags(u8),
    #[error("UI state action {0} is out of range")]
    InvalidUiStateAction(u8),
    #[error("invalid UI state targets {0:#x}")]
    InvalidUiStateTargets(u8),
    #[error("app commands cannot originate from {0:?} devices")]
    InvalidAppCommandDevice(InputType),
}

/// Type-specific data carried by a report.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportPayload {
    /// A bare report, such as a HID notification the pipeline only forwards to observers.
    None,
    Keyboard(RawKeyboardInput),
    Mouse(RawMouseInput),
    Stylus(RawStylusInput),
    Text(RawTextInput),
    UiState(RawUiStateInput),
    AppCommand(RawAppCommandInput),
}

/// See [module level docs](`crate::report`) for details.
#[derive(Clone, Debug, PartialEq)]
pub struct InputReport {
    source: SourceId,
    input_type: InputType,
    mode: InputMode,
    timestamp: Timestamp,
    payload: ReportPayload,
}

/// # Construction
impl InputReport {
    /// A payload-less report of the given type.
    #[must_use]
    pub fn new(
        source: SourceId,
        input_type: InputType,
        mode: InputMode,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            source,
            input_type,
            mode,
            timestamp,
            payload: ReportPayload::None,
        }
    }
    /// Build a payload-less report from raw platform values.
    /// # Errors
    /// Fails if `source` is absent, or `input_type`/`mode` are outside their enumerations.
    pub fn try_from_raw(
        source: Option<SourceId>,
        input_type: u8,
        mode: u8,
        timestamp: Timestamp,
    ) -> Result<Self, ReportError> {
        let source = source.ok_or(ReportError::MissingSource)?;
        let input_type =
            InputType::from_repr(input_type).ok_or(ReportError::InputTypeOutOfRange(input_type))?;
        let mode = InputMode::from_repr(mode).ok_or(ReportError::InputModeOutOfRange(mode))?;
        Ok(Self::new(source, input_type, mode, timestamp))
    }
    /// # Errors
    /// Fails if the action set is not a valid keyboard action combination.
    pub fn keyboard(
        source: SourceId,
        mode: InputMode,
        timestamp: Timestamp,
        input: RawKeyboardInput,
    ) -> Result<Self, ReportError> {
        if !input.actions.is_valid() {
            return Err(ReportError::InvalidKeyboardActions(input.actions.bits()));
        }
        Ok(Self::new(source, InputType::Keyboard, mode, timestamp)
            .with_payload(ReportPayload::Keyboard(input)))
    }
    /// # Errors
    /// Fails if the action set is not a valid mouse action combination.
    pub fn mouse(
        source: SourceId,
        mode: InputMode,
        timestamp: Timestamp,
        input: RawMouseInput,
    ) -> Result<Self, ReportError> {
        if !input.actions.is_valid() {
            return Err(ReportError::InvalidMouseActions(input.actions.bits()));
        }
        Ok(Self::new(source, InputType::Mouse, mode, timestamp)
            .with_payload(ReportPayload::Mouse(input)))
    }
    /// # Errors
    /// Fails unless exactly one known stylus action is set and at least one point is present.
    pub fn stylus(
        source: SourceId,
        mode: InputMode,
        timestamp: Timestamp,
        input: RawStylusInput,
    ) -> Result<Self, ReportError> {
        if !input.actions.is_valid() {
            return Err(ReportError::InvalidStylusActions(input.actions.bits().into()));
        }
        if input.points.is_empty() {
            return Err(ReportError::EmptyStylusPoints);
        }
        Ok(Self::new(source, InputType::Stylus, mode, timestamp)
            .with_payload(ReportPayload::Stylus(input)))
    }
    /// # Errors
    /// Fails if the character flags contain unknown bits.
    pub fn text(
        source: SourceId,
        mode: InputMode,
        timestamp: Timestamp,
        input: RawTextInput,
    ) -> Result<Self, ReportError> {
        if !RawTextFlags::all().contains(input.flags) {
            return Err(ReportError::InvalidTextFlags(input.flags.bits()));
        }
        Ok(Self::new(source, InputType::Text, mode, timestamp)
            .with_payload(ReportPayload::Text(input)))
    }
    /// UI state changes travel as keyboard reports.
    /// # Errors
    /// Fails if the targets contain unknown bits.
    pub fn ui_state(
        source: SourceId,
        mode: InputMode,
        timestamp: Timestamp,
        input: RawUiStateInput,
    ) -> Result<Self, ReportError> {
        if !input.targets.is_valid() {
            return Err(ReportError::InvalidUiStateTargets(input.targets.bits()));
        }
        Ok(Self::new(source, InputType::Keyboard, mode, timestamp)
            .with_payload(ReportPayload::UiState(input)))
    }
    /// # Errors
    /// Fails if the originating device cannot produce app commands.
    pub fn app_command(
        source: SourceId,
        mode: InputMode,
        timestamp: Timestamp,
        input: RawAppCommandInput,
    ) -> Result<Self, ReportError> {
        if !matches!(
            input.device,
            InputType::Keyboard | InputType::Mouse | InputType::Hid
        ) {
            return Err(ReportError::InvalidAppCommandDevice(input.device));
        }
        Ok(Self::new(source, InputType::Command, mode, timestamp)
            .with_payload(ReportPayload::AppCommand(input)))
    }
    fn with_payload(mut self, payload: ReportPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// # Access
impl InputReport {
    #[must_use]
    pub fn source(&self) -> SourceId {
        self.source
    }
    #[must_use]
    pub fn input_type(&self) -> InputType {
        self.input_type
    }
    #[must_use]
    pub fn mode(&self) -> InputMode {
        self.mode
    }
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    #[must_use]
    pub fn payload(&self) -> &ReportPayload {
        &self.payload
    }
}
