//! The per-event carrier used while input transits the pipeline.
//!
//! A [`StagingItem`] holds the current [`InputEventArgs`] plus a small annotation map that
//! stages use to pass facts to later stages. When a device promotes a raw report into a typed
//! event, the new item starts with a copy of the raw item's annotations. The copy is shallow
//! (shared values stay shared) but the maps are independent afterwards.

use std::{any::Any, borrow::Cow, collections::HashMap, sync::Arc};

use crate::{events::InputEventArgs, report::InputType, util::Point, ElementId, StylusDeviceId};

/// Well-known annotation slots. `Custom` covers anything else observers want to attach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationKey {
    ScanCode,
    ExtendedKey,
    SystemKey,
    ClickCount,
    StylusDevice,
    /// The kind of report a typed event was promoted from.
    PromotedFrom,
    /// The element the mouse was directly over when the event was promoted.
    DirectlyOver,
    Custom(&'static str),
}

#[derive(Clone, Debug)]
pub enum Annotation {
    Flag(bool),
    Integer(i64),
    Point(Point),
    Element(Option<ElementId>),
    Stylus(StylusDeviceId),
    Input(InputType),
    Text(Cow<'static, str>),
    /// Arbitrary shared payload. Compared by identity.
    Shared(Arc<dyn Any + Send + Sync>),
}
impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Flag(a), Self::Flag(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Point(a), Self::Point(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Stylus(a), Self::Stylus(b)) => a == b,
            (Self::Input(a), Self::Input(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Shared(a), Self::Shared(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// See [module level docs](`crate::staging`) for details.
#[derive(Debug)]
pub struct StagingItem {
    input: InputEventArgs,
    annotations: HashMap<AnnotationKey, Annotation>,
}
impl StagingItem {
    #[must_use]
    pub fn new(input: InputEventArgs) -> Self {
        Self {
            input,
            annotations: HashMap::new(),
        }
    }
    /// A fresh item for `input`, starting with a copy of `promote`'s annotations if given.
    #[must_use]
    pub fn promoted(input: InputEventArgs, promote: Option<&StagingItem>) -> Self {
        Self {
            input,
            annotations: promote.map(|item| item.annotations.clone()).unwrap_or_default(),
        }
    }
    /// Reuse this item for `input`. Annotations are replaced by a copy of `promote`'s, or cleared.
    pub fn reset(&mut self, input: InputEventArgs, promote: Option<&StagingItem>) {
        self.input = input;
        self.annotations.clear();
        if let Some(promote) = promote {
            self.annotations.extend(
                promote
                    .annotations
                    .iter()
                    .map(|(key, value)| (*key, value.clone())),
            );
        }
    }
    #[must_use]
    pub fn input(&self) -> &InputEventArgs {
        &self.input
    }
    pub fn input_mut(&mut self) -> &mut InputEventArgs {
        &mut self.input
    }
    #[must_use]
    pub fn get_data(&self, key: AnnotationKey) -> Option<&Annotation> {
        self.annotations.get(&key)
    }
    /// Returns the previous value, if any.
    pub fn set_data(&mut self, key: AnnotationKey, value: Annotation) -> Option<Annotation> {
        self.annotations.insert(key, value)
    }
    pub fn remove_data(&mut self, key: AnnotationKey) -> Option<Annotation> {
        self.annotations.remove(&key)
    }
    pub fn annotations(&self) -> impl Iterator<Item = (AnnotationKey, &Annotation)> {
        self.annotations.iter().map(|(key, value)| (*key, value))
    }
}
