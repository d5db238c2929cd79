use crate::event::Event;
use core::{
    error::Error,
    fmt::Display,
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
};
use futures_core::Stream;
use serde::de::DeserializeOwned;

/// Deserialisation failure with the JSON path it happened at
pub type DeserializeError = serde_path_to_error::Error<serde_json::Error>;

pin_project_lite::pin_project! {
    /// Decodes the payload of every [Event] from the inner stream as JSON
    #[derive(Debug)]
    pub struct JsonStream<T, S> {
        #[pin]
        stream_state: JsonStreamState<S>,
        output_marker: PhantomData<fn() -> T>,
    }
}

impl<T, S> JsonStream<T, S> {
    #[must_use]
    pub fn new(stream: S) -> Self
    where
        T: DeserializeOwned,
    {
        JsonStream {
            stream_state: JsonStreamState::Active { stream },
            output_marker: PhantomData,
        }
    }
}

pin_project_lite::pin_project! {
    #[derive(Debug)]
    #[project = JsonStreamStateProjection]
    enum JsonStreamState<S> {
        Active {
            #[pin]
            stream: S
        },
        Inactive,
    }
}

#[derive(Debug)]
pub enum JsonStreamError<E> {
    Stream(E),
    Deserialize(DeserializeError),
}

impl<E> JsonStreamError<E> {
    /// Dotted path of the value that failed to deserialise, `.` for the root
    pub fn path(&self) -> Option<String> {
        match self {
            JsonStreamError::Deserialize(e) => Some(e.path().to_string()),
            JsonStreamError::Stream(_) => None,
        }
    }
}

impl<E> Display for JsonStreamError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JsonStreamError::Stream(e) => e.fmt(f),
            JsonStreamError::Deserialize(e) => e.fmt(f),
        }
    }
}

impl<E> Error for JsonStreamError<E> where E: Error {}

fn decode<T: DeserializeOwned>(data: &str) -> Result<T, DeserializeError> {
    let mut deserializer = serde_json::Deserializer::from_str(data);
    serde_path_to_error::deserialize(&mut deserializer)
}

impl<T, S, E> Stream for JsonStream<T, S>
where
    S: Stream<Item = Result<Event, E>>,
    T: DeserializeOwned,
{
    type Item = Result<T, JsonStreamError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        let stream = match this.stream_state.as_mut().project() {
            JsonStreamStateProjection::Active { stream } => stream,
            JsonStreamStateProjection::Inactive => return Poll::Ready(None),
        };

        let Some(next) = core::task::ready!(stream.poll_next(cx)) else {
            this.stream_state.set(JsonStreamState::Inactive);
            return Poll::Ready(None);
        };
        Poll::Ready(Some(
            next.map_err(JsonStreamError::Stream)
                .and_then(|event| decode(&event.data).map_err(JsonStreamError::Deserialize)),
        ))
    }
}
