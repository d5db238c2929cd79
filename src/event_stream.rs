use core::{
    pin::Pin,
    str::Utf8Error,
    task::{Context, Poll, ready},
};

use bytes::{Buf, BytesMut};
use futures_core::Stream;

use crate::{
    constants::BOM,
    errors::EventStreamError,
    event::Event,
    parser::{ValidatedEventLine, parse_line_from_buffer},
};

#[derive(Debug, Clone, Copy)]
pub(crate) enum EventStreamState {
    NotStarted,
    Started,
    Terminated,
}

impl EventStreamState {
    fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }
}

/// [Some] once there are enough bytes to tell whether `bytes` starts with a BOM
pub(crate) fn starts_with_bom(bytes: &[u8]) -> Option<bool> {
    if bytes.len() >= BOM.len() {
        Some(bytes.starts_with(BOM))
    } else if BOM.starts_with(bytes) {
        None
    } else {
        Some(false)
    }
}

/// Pulls complete lines off the front of `buffer` until one of them is a `data:` line
pub(crate) fn parse_event(buffer: &mut BytesMut) -> Result<Option<Event>, Utf8Error> {
    while let Some(line) = parse_line_from_buffer(buffer) {
        match line.validate()? {
            ValidatedEventLine::Data(data) => return Ok(Some(Event { data })),
            ValidatedEventLine::Ignored => continue,
        }
    }
    Ok(None)
}

macro_rules! try_parse_event_buffer {
    ($this:ident) => {
        match parse_event($this.buffer) {
            Ok(Some(event)) => return Poll::Ready(Some(Ok(event))),
            Err(e) => return Poll::Ready(Some(Err(EventStreamError::Utf8Error(e)))),
            Ok(None) => {}
        }
    };
}

pin_project_lite::pin_project! {
    /// [`Stream`][futures_core::Stream] that turns a stream of byte chunks into one [`Event`] per `data:` line
    #[project = EventStreamProjection]
    #[derive(Debug)]
    pub struct EventStream<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        state: EventStreamState,
    }
}

impl<S> EventStream<S> {
    /// Create a new [`EventStream`] from a stream of [`AsRef<[u8]>`][AsRef]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            state: EventStreamState::NotStarted,
        }
    }

    /// Take the current buffer from the [EventStream], after the inner stream ends this is the unterminated last line if there was one
    pub fn take_buffer(self) -> BytesMut {
        self.buffer
    }
}

impl<S, E, B> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Event, EventStreamError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        try_parse_event_buffer!(this);

        if this.state.is_terminated() {
            return Poll::Ready(None);
        }

        loop {
            let new_bytes = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(o)) => o,
                Some(Err(e)) => return Poll::Ready(Some(Err(EventStreamError::Transport(e)))),
                None => {
                    // an unterminated last line never becomes an event, it stays in the buffer
                    *this.state = EventStreamState::Terminated;
                    return Poll::Ready(None);
                }
            };

            let new_bytes = new_bytes.as_ref();

            if new_bytes.is_empty() {
                continue;
            }

            this.buffer.extend_from_slice(new_bytes);

            if this.state.is_not_started() {
                match starts_with_bom(this.buffer) {
                    Some(true) => {
                        *this.state = EventStreamState::Started;
                        this.buffer.advance(BOM.len());
                    }
                    Some(false) => *this.state = EventStreamState::Started,
                    None => continue,
                }
            }

            try_parse_event_buffer!(this);
        }
    }
}
