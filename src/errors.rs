//! [`Error`][core::error::Error] implementations used across the crate

use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

#[cfg(feature = "reqwest")]
pub mod reqwest;
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReaderError;

/// Error from an [EventStream][crate::event_stream::EventStream]
#[derive(Debug, PartialEq)]
pub enum EventStreamError<E> {
    /// Something went wrong with the underlying stream
    Transport(E),
    /// A `data:` line had invalid utf8
    Utf8Error(Utf8Error),
}

impl<E> From<Utf8Error> for EventStreamError<E> {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl<E> Display for EventStreamError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            EventStreamError::Transport(e) => e.fmt(f),
            EventStreamError::Utf8Error(e) => e.fmt(f),
        }
    }
}

impl<E> core::error::Error for EventStreamError<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            EventStreamError::Transport(e) => Some(e),
            EventStreamError::Utf8Error(e) => Some(e),
        }
    }
}
