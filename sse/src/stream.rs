use axum::response::sse::Event;
use log::*;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Unique identifier for an event stream (server-generated).
///
/// Doubles as the id reported in the stream's handshake frame and as the key
/// the disconnect observer uses to evict exactly this stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(String);

impl StreamId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type CloseObserver = Box<dyn FnOnce(&StreamId) + Send + 'static>;

/// One half-open push channel from the hub to a single SSE consumer.
///
/// The stream owns the sender side; the receiver half is handed to the HTTP
/// layer inside a [`Subscription`]. `close` takes the sender, which ends the
/// consumer's wire loop, and fires the disconnect observer exactly once.
pub struct EventStream {
    id: StreamId,
    sender: Mutex<Option<UnboundedSender<Result<Event, Infallible>>>>,
    on_closed: Mutex<Option<CloseObserver>>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Open a fresh stream. Only registries create streams, so the receiver
    /// half stays inside the crate until it is wrapped in a subscription.
    pub(crate) fn open() -> (Arc<EventStream>, UnboundedReceiver<Result<Event, Infallible>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stream = Arc::new(EventStream {
            id: StreamId::new(),
            sender: Mutex::new(Some(sender)),
            on_closed: Mutex::new(None),
        });

        (stream, receiver)
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Register the single disconnect observer. Registries install this right
    /// after opening the stream, before it becomes reachable by publishers.
    pub(crate) fn on_closed(&self, observer: impl FnOnce(&StreamId) + Send + 'static) {
        *self.on_closed.lock().unwrap() = Some(Box::new(observer));
    }

    /// Enqueue a frame for the consumer. Pushing to a closed stream or past a
    /// departed consumer is a silent drop; delivery is best-effort by contract.
    pub fn push(&self, frame: Event) {
        let sender = self.sender.lock().unwrap();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(Ok(frame)).is_err() {
                    debug!("Dropped frame for stream {}: consumer is gone", self.id);
                }
            }
            None => debug!("Dropped frame for stream {}: stream is closed", self.id),
        }
    }

    /// Whether a consumer can still observe pushed frames: the stream has not
    /// been closed and the receiver half is still attached.
    pub fn is_live(&self) -> bool {
        self.sender
            .lock()
            .unwrap()
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap().is_none()
    }

    /// Close the stream and fire the disconnect observer. Idempotent; later
    /// calls are no-ops. The observer runs after all internal locks are
    /// released, so it may re-enter the owning registry safely.
    pub fn close(&self) {
        let sender = self.sender.lock().unwrap().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let observer = self.on_closed.lock().unwrap().take();
        if let Some(observer) = observer {
            observer(&self.id);
        }
    }
}

/// Closes its stream when dropped.
///
/// The guard travels inside the SSE response body, so the stream is closed and
/// evicted no matter how the connection ends: client disconnect drops the
/// body, server-side close ends the frame loop.
#[derive(Debug)]
pub struct StreamGuard {
    stream: Arc<EventStream>,
}

impl StreamGuard {
    pub(crate) fn new(stream: Arc<EventStream>) -> Self {
        Self { stream }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stream.close();
    }
}

/// The consumer half of a registered stream: its id, the frame receiver, and
/// the guard that evicts the stream when the connection ends.
#[derive(Debug)]
pub struct Subscription {
    stream_id: StreamId,
    receiver: UnboundedReceiver<Result<Event, Infallible>>,
    guard: StreamGuard,
}

impl Subscription {
    pub(crate) fn new(
        stream: &Arc<EventStream>,
        receiver: UnboundedReceiver<Result<Event, Infallible>>,
    ) -> Self {
        Self {
            stream_id: stream.id().clone(),
            receiver,
            guard: StreamGuard::new(Arc::clone(stream)),
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        StreamId,
        UnboundedReceiver<Result<Event, Infallible>>,
        StreamGuard,
    ) {
        (self.stream_id, self.receiver, self.guard)
    }
}
