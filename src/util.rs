//! Small value types shared by the report, device, and stylus modules.

/// A position in logical pixels, relative to the top left of the input source's surface.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}
impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
    /// Whether `other` lies within a `width` x `height` box centered on `self`.
    #[must_use]
    pub fn within(self, other: Self, width: f64, height: f64) -> bool {
        (self.x - other.x).abs() <= width / 2.0 && (self.y - other.y).abs() <= height / 2.0
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NicheF32Error {
    /// Attempted to make a non-NaN value out of NaN.
    #[error("provided value was NaN")]
    NaN,
}

/// An Option type where NaN is the niche.
///
/// Stylus points carry several optional axes, this keeps each of them at four bytes.
#[derive(Copy, Clone, PartialOrd)]
pub struct NicheF32(f32);
impl NicheF32 {
    pub const NONE: NicheF32 = NicheF32(f32::NAN);
    /// Wrap a non-`NaN` value. Fails with `None` if the value was `NaN`.
    #[must_use]
    pub fn new_some(value: f32) -> Option<Self> {
        (!value.is_nan()).then_some(Self(value))
    }
    /// Get a `None` niche.
    #[must_use]
    pub const fn new_none() -> Self {
        Self::NONE
    }
    /// Get the optional value within. If `Some`, guaranteed to not be `NaN`.
    #[must_use]
    pub fn get(self) -> Option<f32> {
        (!self.0.is_nan()).then_some(self.0)
    }
}
impl TryFrom<Option<f32>> for NicheF32 {
    type Error = NicheF32Error;
    fn try_from(value: Option<f32>) -> Result<Self, Self::Error> {
        if value.is_some_and(f32::is_nan) {
            Err(NicheF32Error::NaN)
        } else {
            Ok(NicheF32(value.unwrap_or(f32::NAN)))
        }
    }
}
impl Default for NicheF32 {
    fn default() -> Self {
        // Absent is more reasonable than Some(0.0) for a sensor axis.
        Self::new_none()
    }
}
impl std::fmt::Debug for NicheF32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.get())
    }
}
impl PartialEq for NicheF32 {
    fn eq(&self, other: &Self) -> bool {
        // All NaNs are filtered to None (and considered to be equal here)
        self.get() == other.get()
    }
}
impl Eq for NicheF32 {}
impl PartialEq<f32> for NicheF32 {
    fn eq(&self, other: &f32) -> bool {
        self.get().is_some_and(|value| value == *other)
    }
}
