use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};
use std::borrow::Cow;

use bytes::Bytes;
use reqwest::StatusCode;

use crate::errors::EventStreamError;

/// Terminal failure of an [EventSubscription][crate::reader::EventSubscription].
///
/// Stopping a subscription is not an error, the stream just ends.
#[derive(Debug)]
pub enum ReaderError {
    /// Network or connection failure reported by [reqwest]
    Transport(reqwest::Error),
    /// The server answered outside 200-299, carries whatever body it sent
    Status { status: StatusCode, body: Bytes },
    /// A `data:` line in a successful response had invalid utf8
    Utf8(Utf8Error),
}

impl ReaderError {
    pub fn is_transport_err(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The server rejected the request, retrying as-is is unlikely to help
    pub fn is_status_err(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            Self::Utf8(_) => None,
        }
    }

    /// Raw body of a non-success response
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Body of a non-success response as text, invalid utf8 is replaced
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body().map(|body| String::from_utf8_lossy(body))
    }
}

impl From<EventStreamError<reqwest::Error>> for ReaderError {
    fn from(value: EventStreamError<reqwest::Error>) -> Self {
        match value {
            EventStreamError::Transport(e) => Self::Transport(e),
            EventStreamError::Utf8Error(e) => Self::Utf8(e),
        }
    }
}

impl From<reqwest::Error> for ReaderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

impl Display for ReaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ReaderError::Transport(e) => e.fmt(f),
            ReaderError::Status { status, body } if body.is_empty() => {
                write!(f, "server responded with {status}")
            }
            ReaderError::Status { status, body } => write!(
                f,
                "server responded with {status}: {}",
                String::from_utf8_lossy(body)
            ),
            ReaderError::Utf8(e) => e.fmt(f),
        }
    }
}

impl core::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            ReaderError::Transport(e) => Some(e),
            ReaderError::Status { .. } => None,
            ReaderError::Utf8(e) => Some(e),
        }
    }
}
