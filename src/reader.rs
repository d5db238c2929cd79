//! [EventReader], one streaming request per [EventReader::start] read as a stream of [Event]s

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, ready},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::BytesMut;
use futures_core::{Stream, future::BoxFuture, stream::FusedStream};
use futures_util::task::AtomicWaker;
use http_body_util::BodyDataStream;
use pin_project_lite::pin_project;
use reqwest::{
    Body, Client, Error as ReqwestError, Request, RequestBuilder, Response, StatusCode,
    header::{ACCEPT, HeaderValue},
};
use tracing::{debug, trace, warn};

use crate::{
    constants::EVENT_STREAM_MIME, curl::curl_command, errors::ReaderError, event::Event,
    event_stream::EventStream,
};

pin_project! {
    #[project = ConnectionProjection]
    enum Connection {
        Connecting {
            #[pin]
            future: BoxFuture<'static, Result<Response, ReqwestError>>,
        },
        Open {
            #[pin]
            stream: EventStream<BodyDataStream<Body>>,
        },
        // non-2xx, the body is an error message rather than events
        Rejected {
            #[pin]
            body: BodyDataStream<Body>,
            status: StatusCode,
            buffer: BytesMut,
        },
        // the request never made it to the wire
        Failed {
            error: Option<ReaderError>,
        },
    }
}

impl Connection {
    fn from_response(response: Response) -> Self {
        let status = response.status();
        if status.is_success() {
            debug!(%status, url = %response.url(), "event stream open");
            Connection::Open {
                stream: crate::response_to_stream(response),
            }
        } else {
            warn!(%status, url = %response.url(), "event stream rejected");
            Connection::Rejected {
                body: BodyDataStream::new(Body::from(response)),
                status,
                buffer: BytesMut::new(),
            }
        }
    }

    /// Polls for the next event. [None] and [Err] are both terminal.
    fn poll_event(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Event, ReaderError>>> {
        loop {
            let next = match self.as_mut().project() {
                ConnectionProjection::Connecting { future } => match ready!(future.poll(cx)) {
                    Ok(response) => Connection::from_response(response),
                    Err(e) => return Poll::Ready(Some(Err(ReaderError::Transport(e)))),
                },
                ConnectionProjection::Open { stream } => {
                    return stream
                        .poll_next(cx)
                        .map(|item| item.map(|res| res.map_err(ReaderError::from)));
                }
                ConnectionProjection::Rejected {
                    mut body,
                    status,
                    buffer,
                } => loop {
                    match ready!(body.as_mut().poll_next(cx)) {
                        Some(Ok(chunk)) => {
                            trace!(len = chunk.len(), "error body chunk");
                            buffer.extend_from_slice(&chunk);
                        }
                        Some(Err(e)) => return Poll::Ready(Some(Err(ReaderError::Transport(e)))),
                        // nothing captured, the rejection has no message to surface
                        None if buffer.is_empty() => {
                            warn!(%status, "event stream rejected with an empty body");
                            return Poll::Ready(None);
                        }
                        None => {
                            return Poll::Ready(Some(Err(ReaderError::Status {
                                status: *status,
                                body: buffer.split().freeze(),
                            })));
                        }
                    }
                },
                ConnectionProjection::Failed { error } => return Poll::Ready(error.take().map(Err)),
            };
            self.set(next);
        }
    }
}

struct Shared {
    connection: Mutex<Option<Pin<Box<Connection>>>>,
    waker: AtomicWaker,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Pin<Box<Connection>>>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the connection if there still is one and wakes whoever is waiting on it
    fn close(&self) {
        let connection = self.lock().take();
        if connection.is_some() {
            debug!("event stream stopped");
            drop(connection);
            self.waker.wake();
        }
    }
}

/// Stops an [EventSubscription] without owning it.
///
/// Once the subscription is dropped the handle does nothing.
#[derive(Clone)]
pub struct StopHandle {
    shared: Weak<Shared>,
}

impl StopHandle {
    /// Closes the connection, the subscription then ends without an error. Calling it again is a no-op.
    pub fn stop(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.close();
        }
    }

    /// `true` once the subscription finished, was stopped, or was dropped
    pub fn is_stopped(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.lock().is_none())
            .unwrap_or(true)
    }
}

impl core::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// [Stream] of the [Event]s of one connection.
///
/// Ends with [None] after the body finishes or after [EventSubscription::stop]. A failure is
/// yielded once as the last item. Dropping the subscription closes the connection.
pub struct EventSubscription {
    shared: Arc<Shared>,
}

impl EventSubscription {
    fn new(connection: Connection) -> Self {
        Self {
            shared: Arc::new(Shared {
                connection: Mutex::new(Some(Box::pin(connection))),
                waker: AtomicWaker::new(),
            }),
        }
    }

    pub fn stop(&self) {
        self.shared.close();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl core::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl Stream for EventSubscription {
    type Item = Result<Event, ReaderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.shared.waker.register(cx.waker());

        // holding the lock while polling means a racing stop either happens before we look or after we're done
        let mut slot = self.shared.lock();
        let Some(connection) = slot.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(connection.as_mut().poll_event(cx)) {
            Some(Ok(event)) => Poll::Ready(Some(Ok(event))),
            Some(Err(e)) => {
                warn!(error = %e, "event stream failed");
                *slot = None;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                debug!("event stream finished");
                *slot = None;
                Poll::Ready(None)
            }
        }
    }
}

impl FusedStream for EventSubscription {
    fn is_terminated(&self) -> bool {
        self.shared.lock().is_none()
    }
}

/// Opens streaming requests and reads the `data:` lines of their responses.
///
/// Each [EventReader::start] sends exactly one request. There is no reconnection, wrap the reader
/// yourself if you want retries.
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut reader = ssereader::EventReader::new();
/// let mut events = reader.start(reqwest::Client::new().get("https://example.com/events"));
///
/// while let Some(event) = events.next().await {
///     println!("{}", event?);
/// }
/// ```
#[derive(Debug, Default)]
pub struct EventReader {
    client: Client,
    current: Option<StopHandle>,
}

impl EventReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader whose [EventReader::start_request] goes through `client`
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            current: None,
        }
    }

    /// Sends `request` with `Accept: text/event-stream`, replacing any `Accept` it had.
    ///
    /// A connection previously started by this reader is stopped first. Building errors surface as
    /// the first item of the returned stream.
    pub fn start(&mut self, request: RequestBuilder) -> EventSubscription {
        let (client, request) = request.build_split();
        self.open(client, request)
    }

    /// Like [EventReader::start] for an already built [Request], sent with this reader's [Client]
    pub fn start_request(&mut self, request: Request) -> EventSubscription {
        let client = self.client.clone();
        self.open(client, Ok(request))
    }

    /// Stops the connection of the last [EventReader::start], if it is still running
    pub fn stop(&self) {
        if let Some(current) = &self.current {
            current.stop();
        }
    }

    fn open(
        &mut self,
        client: Client,
        request: Result<Request, ReqwestError>,
    ) -> EventSubscription {
        self.stop();

        let connection = match request {
            Ok(mut request) => {
                request
                    .headers_mut()
                    .insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME));
                trace!(curl = %curl_command(&request), "event stream request");
                debug!(method = %request.method(), url = %request.url(), "opening event stream");
                Connection::Connecting {
                    future: Box::pin(RequestBuilder::from_parts(client, request).send()),
                }
            }
            Err(e) => Connection::Failed {
                error: Some(ReaderError::Transport(e)),
            },
        };

        let subscription = EventSubscription::new(connection);
        self.current = Some(subscription.stop_handle());
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use futures::prelude::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        sync::oneshot,
        task::JoinHandle,
    };

    async fn read_head(socket: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&head).to_lowercase()
    }

    async fn write_chunk(socket: &mut TcpStream, chunk: &[u8]) {
        socket
            .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
            .await
            .unwrap();
        socket.write_all(chunk).await.unwrap();
        socket.write_all(b"\r\n").await.unwrap();
        socket.flush().await.unwrap();
    }

    /// Serves a single request with a chunked body, one write per chunk. Resolves to the lowercased request head.
    async fn serve(status: &'static str, chunks: Vec<&'static [u8]>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/events", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_head(&mut socket).await;
            socket
                .write_all(
                    format!(
                        "HTTP/1.1 {status}\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
                    )
                    .as_bytes(),
                )
                .await
                .unwrap();
            for chunk in chunks {
                write_chunk(&mut socket, chunk).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            head
        });

        (url, handle)
    }

    /// Sends response headers then keeps the body open until `release` fires or is dropped.
    /// `closed` fires if the client hangs up first.
    async fn serve_open() -> (String, oneshot::Sender<()>, oneshot::Receiver<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/events", listener.local_addr().unwrap());
        let (release, released) = oneshot::channel::<()>();
        let (hung_up, closed) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_head(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n")
                .await
                .unwrap();
            socket.flush().await.unwrap();

            let mut buf = [0u8; 64];
            tokio::select! {
                _ = released => {}
                _ = async {
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                } => {
                    let _ = hung_up.send(());
                }
            }
        });

        (url, release, closed)
    }

    async fn collect(subscription: EventSubscription) -> (Vec<String>, Option<ReaderError>) {
        let mut events = Vec::new();
        let mut failure = None;
        let mut subscription = subscription;
        while let Some(item) = subscription.next().await {
            match item {
                Ok(event) => events.push(event.data.to_string()),
                Err(e) => failure = Some(e),
            }
        }
        (events, failure)
    }

    #[tokio::test]
    async fn split_chunks_yield_events_in_order() {
        let (url, server) = serve("200 OK", vec![b"data: hel", b"lo\n\ndata: world\n\n"]).await;

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;

        assert_eq!(events, vec!["hello", "world"]);
        assert!(failure.is_none());
        assert!(server.await.unwrap().contains("accept: text/event-stream"));
    }

    #[tokio::test]
    async fn many_events_in_one_chunk() {
        let (url, _server) = serve(
            "200 OK",
            vec![b": hi\n\ndata: 1\ndata:\ndata: {\"a\": 2}\r\n\nevent: end\n"],
        )
        .await;

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;

        assert_eq!(events, vec!["1", "", "{\"a\": 2}"]);
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn no_data_lines_is_a_clean_end() {
        let (url, _server) = serve("200 OK", vec![b": keepalive\n\n", b"event: nothing\n\n"]).await;

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;

        assert!(events.is_empty());
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn non_success_status_captures_body() {
        let (url, _server) = serve("404 Not Found", vec![b"not ", b"found"]).await;

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;

        assert!(events.is_empty());
        let failure = failure.expect("status failure");
        assert!(failure.is_status_err());
        assert_eq!(failure.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(failure.body_text().as_deref(), Some("not found"));
    }

    #[tokio::test]
    async fn non_success_status_never_parses_data_lines() {
        let (url, _server) = serve("500 Internal Server Error", vec![b"data: nope\n\n"]).await;

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;

        assert!(events.is_empty());
        let failure = failure.expect("status failure");
        assert_eq!(failure.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(failure.body_text().as_deref(), Some("data: nope\n\n"));
    }

    #[tokio::test]
    async fn accept_header_is_replaced_and_others_kept() {
        let (url, server) = serve("200 OK", vec![b"data: x\n"]).await;

        let request = Client::new()
            .post(&url)
            .header(ACCEPT, "application/json")
            .header("x-token", "abc")
            .body("{}");
        let mut reader = EventReader::new();
        let (events, _) = collect(reader.start(request)).await;
        assert_eq!(events, vec!["x"]);

        let head = server.await.unwrap();
        assert!(head.starts_with("post /events"));
        assert!(head.contains("accept: text/event-stream"));
        assert!(!head.contains("application/json"));
        assert!(head.contains("x-token: abc"));
    }

    #[tokio::test]
    async fn start_request_uses_reader_client() {
        let (url, server) = serve("200 OK", vec![b"data: built\n"]).await;

        let client = Client::new();
        let request = client.get(&url).build().unwrap();
        let mut reader = EventReader::with_client(client);
        let (events, failure) = collect(reader.start_request(request)).await;

        assert_eq!(events, vec!["built"]);
        assert!(failure.is_none());
        assert!(server.await.unwrap().contains("accept: text/event-stream"));
    }

    #[tokio::test]
    async fn transport_errors_end_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/events", listener.local_addr().unwrap());
        drop(listener);

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;
        assert!(events.is_empty());
        assert!(failure.expect("connect failure").is_transport_err());

        let (events, failure) = collect(reader.start(Client::new().get("not a url"))).await;
        assert!(events.is_empty());
        assert!(failure.expect("build failure").is_transport_err());
    }

    #[tokio::test]
    async fn stop_before_any_bytes() {
        let (url, _release, _closed) = serve_open().await;

        let mut reader = EventReader::new();
        let mut subscription = reader.start(Client::new().get(&url));
        reader.stop();
        reader.stop();
        subscription.stop();

        assert!(subscription.is_terminated());
        assert!(subscription.next().await.is_none());
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn stop_wakes_a_waiting_consumer() {
        let (url, _release, _closed) = serve_open().await;

        let mut reader = EventReader::new();
        let mut subscription = reader.start(Client::new().get(&url));
        let handle = subscription.stop_handle();
        assert!(!handle.is_stopped());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
            handle.stop();
            handle
        });

        let next = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("stop should wake the consumer");
        assert!(next.is_none());
        assert!(stopper.await.unwrap().is_stopped());
    }

    #[tokio::test]
    async fn stop_after_completion_is_a_no_op() {
        let (url, _server) = serve("200 OK", vec![b"data: only\n"]).await;

        let mut reader = EventReader::new();
        let mut subscription = reader.start(Client::new().get(&url));
        assert_eq!(subscription.next().await.unwrap().unwrap(), "only");
        assert!(subscription.next().await.is_none());

        subscription.stop();
        reader.stop();
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn restarting_stops_the_previous_connection() {
        let (first_url, _release, _closed) = serve_open().await;
        let (second_url, _server) = serve("200 OK", vec![b"data: second\n"]).await;

        let mut reader = EventReader::new();
        let mut first = reader.start(Client::new().get(&first_url));
        let second = reader.start(Client::new().get(&second_url));

        assert!(first.next().await.is_none());
        let (events, failure) = collect(second).await;
        assert_eq!(events, vec!["second"]);
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn dropped_subscription_detaches_the_handle() {
        let (url, _release, _closed) = serve_open().await;

        let mut reader = EventReader::new();
        let subscription = reader.start(Client::new().get(&url));
        let handle = subscription.stop_handle();
        drop(subscription);

        assert!(handle.is_stopped());
        handle.stop();
        reader.stop();
    }

    #[tokio::test]
    async fn dropping_an_open_subscription_hangs_up() {
        let (url, _release, closed) = serve_open().await;

        let mut reader = EventReader::new();
        let mut subscription = reader.start(Client::new().get(&url));

        // connect and read the headers, the body never produces anything
        let pending = tokio::time::timeout(Duration::from_millis(300), subscription.next()).await;
        assert!(pending.is_err());

        drop(subscription);

        tokio::time::timeout(Duration::from_secs(5), closed)
            .await
            .expect("connection should be released on drop")
            .expect("server saw the client hang up");
    }

    #[tokio::test]
    async fn empty_rejection_is_a_clean_end() {
        let (url, _server) = serve("404 Not Found", vec![]).await;

        let mut reader = EventReader::new();
        let (events, failure) = collect(reader.start(Client::new().get(&url))).await;

        assert!(events.is_empty());
        assert!(failure.is_none());
    }
}
