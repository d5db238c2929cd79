//! The payload of a single `data:` line

use core::{
    fmt::{Display, Formatter},
    ops::Deref,
};

use bytes_utils::Str;

/// One event from an [EventStream][crate::event_stream::EventStream], the trimmed text after `data:`.
///
/// Every `data:` line becomes its own [Event]. Consecutive data lines are not joined and the
/// `event`, `id` and `retry` fields of the full SSE format are not tracked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub data: Str,
}

impl Event {
    pub fn new(data: impl Into<Str>) -> Self {
        Self { data: data.into() }
    }

    pub fn into_data(self) -> Str {
        self.data
    }
}

impl Deref for Event {
    type Target = str;

    fn deref(&self) -> &str {
        &self.data
    }
}

impl AsRef<str> for Event {
    fn as_ref(&self) -> &str {
        &self.data
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        self.data.fmt(f)
    }
}

impl From<Str> for Event {
    fn from(data: Str) -> Self {
        Self { data }
    }
}

impl PartialEq<str> for Event {
    fn eq(&self, other: &str) -> bool {
        &*self.data == other
    }
}

impl PartialEq<&str> for Event {
    fn eq(&self, other: &&str) -> bool {
        &*self.data == *other
    }
}
