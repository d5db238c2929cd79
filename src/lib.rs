//! Read the `data:` lines of a [Server-Sent Events](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! response as a stream of payloads.
//!
//! `ssereader` keeps to a deliberately small subset of SSE: every line that starts with `data:` becomes one
//! [`Event`][event::Event] holding the trimmed text after the prefix, every other line is skipped. Consecutive
//! data lines are not joined and `event`, `id` and `retry` fields are not tracked.
//!
//! - [`EventReader`] (requires `reqwest` feature) - sends one request per
//!   [`start`][EventReader::start] with `Accept: text/event-stream`, separates non-2xx bodies from stream
//!   data and can be [stopped][EventReader::stop] at any point.
//! - [`EventStream`] - a generic [`Stream`][futures_core::Stream] adapter that converts any
//!   `Stream<Item = Result<impl AsRef<[u8]>, E>>` into a stream of [`Event`][event::Event]s.
//! - [`JsonStream`][json_stream::JsonStream] (requires `json` feature) - decodes each payload into a
//!   typed value, errors carry the JSON path that failed.
//! - Low-level parsing via [`parser::parse_line`] and [`parser::parse_line_from_buffer`].
//!
//! # Quick start with `reqwest`
//!
//! ```ignore
//! use futures::StreamExt;
//! use ssereader::EventReader;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = EventReader::new();
//! let mut events = reader.start(reqwest::Client::new().get("https://example.com/events"));
//!
//! while let Some(result) = events.next().await {
//!     match result {
//!         Ok(event) => println!("{event}"),
//!         Err(e) if e.is_status_err() => eprintln!("rejected: {e}"),
//!         Err(e) => eprintln!("network error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Using `EventStream` directly
//!
//! If you already have a byte stream (from any HTTP client, WebSocket, file, etc.)
//! you can use [`EventStream`] without the `reqwest` feature:
//!
//! ```rust
//! use bytes::Bytes;
//! use futures::StreamExt;
//! use ssereader::EventStream;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let chunks = vec![
//!     Ok::<_, std::io::Error>(Bytes::from("data: hel")),
//!     Ok(Bytes::from("lo\n\ndata: world\n\n")),
//! ];
//! let mut stream = EventStream::new(futures::stream::iter(chunks));
//!
//! while let Some(Ok(event)) = stream.next().await {
//!     println!("{}", event.data);
//! }
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Description | no std? |
//! | --- | --- | --- | --- |
//! | `serde` | off | Derives [`Serialize`][::serde::Serialize] and [`Deserialize`][::serde::Deserialize] on [`Event`][event::Event]. | false |
//! | `std` | off | Enables standard library support in core dependencies (`bytes`, `memchr`, `futures-core`, etc.). Turned on automatically by `reqwest` and `json`. | false |
//! | `reqwest` | on | Provides [`EventReader`] and logs connection lifecycle through [`tracing`]. | false |
//! | `json` | off | Provides [`JsonStream`][json_stream::JsonStream] for deserialising event payloads into typed values via [`serde_json`]. | false |
//!
//! With default features off the crate is `no_std` compatible and provides
//! [`EventStream`] and the low-level parser.

#![cfg_attr(not(feature = "std"), no_std)]

pub(crate) mod constants;
#[cfg(feature = "reqwest")]
pub mod curl;
pub mod errors;
pub mod event;
pub mod event_stream;
pub mod parser;
#[cfg(feature = "reqwest")]
pub mod reader;

#[cfg(feature = "json")]
pub mod json_stream;

#[cfg(feature = "reqwest")]
pub use reader::{EventReader, EventSubscription, StopHandle};

pub use constants::{DATA_PREFIX, EVENT_STREAM_MIME};
pub use event::Event;
pub use event_stream::EventStream;

#[cfg(feature = "reqwest")]
/// Convert a [`Response`][::reqwest::Response] into an [`EventStream`] via a similar mechanism to [::reqwest::Response::bytes_stream].
///
/// The status code is not checked, use [`EventReader`] if non-2xx bodies should become errors.
pub fn response_to_stream(
    response: ::reqwest::Response,
) -> EventStream<http_body_util::BodyDataStream<::reqwest::Body>> {
    EventStream::new(http_body_util::BodyDataStream::new(
        ::reqwest::Body::from(response),
    ))
}
