use crate::category::Category;
use crate::envelope::{self, Envelope, EventId};
use crate::error::Error;
use crate::stream::{EventStream, StreamId, Subscription};
use axum::response::sse::Event;
use log::*;
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

// Type alias for session IDs (the web layer passes them through verbatim)
pub type SessionId = String;

/// How an attach or publish resolved against the session's current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No entry existed; a fresh stream was stored.
    Created,
    /// A dead entry existed and was swapped for a fresh stream.
    Replaced,
    /// The existing stream was kept as the target.
    Reused,
}

struct SessionEntry {
    stream: Arc<EventStream>,
    /// Set once a consumer has attached and started draining the stream.
    /// Later events still fan into the stream while it stays live.
    consumed: bool,
}

/// Registry for the session variant: at most one tracked stream per session
/// id, with a single consumer at a time.
///
/// All entry transitions happen under one lock, so concurrent attaches and
/// publishes observe a consistent entry state. Streams are never closed while
/// the lock is held; a closing stream's disconnect observer re-enters this
/// registry to evict itself.
#[derive(Clone)]
pub struct SessionRegistry {
    entries: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attach a consumer to `session_id`, storing a fresh stream for it.
    ///
    /// Decided by the liveness of the current entry, atomically:
    /// - no entry: a fresh stream is stored (`Created`)
    /// - entry whose consumer is still draining it: the attach is refused
    /// - entry without a live consumer (a publish-created slot, or a stream
    ///   whose consumer departed but was not yet evicted): swapped for a fresh
    ///   stream (`Replaced`)
    pub fn attach(&self, session_id: &str) -> Result<(Resolution, Subscription), Error> {
        let (stream, receiver) = self.new_stream(session_id);
        // Queue the handshake before the stream is reachable by publishers, so
        // it is always the first frame.
        stream.push(envelope::handshake(stream.id()));

        let (resolution, displaced) = {
            let mut entries = self.entries.lock().unwrap();
            match entries.entry(session_id.to_string()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().stream.is_live() {
                        debug!(
                            "Session {session_id}: attach refused, stream {} still has a consumer",
                            occupied.get().stream.id()
                        );
                        return Err(Error::stream_conflict());
                    }

                    let displaced = occupied.insert(SessionEntry {
                        stream: Arc::clone(&stream),
                        consumed: false,
                    });
                    (Resolution::Replaced, Some(displaced.stream))
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(SessionEntry {
                        stream: Arc::clone(&stream),
                        consumed: false,
                    });
                    (Resolution::Created, None)
                }
            }
        };

        // Close outside the lock; the displaced stream's observer re-enters
        // the map and finds the successor already in place.
        if let Some(displaced) = displaced {
            displaced.close();
        }

        info!(
            "Session {session_id}: attached stream {} ({resolution:?})",
            stream.id()
        );
        Ok((resolution, Subscription::new(&stream, receiver)))
    }

    /// Mark the session's entry as consumed. Called once a GET connection has
    /// attached and begun serving. No-op for untracked sessions.
    pub fn mark_consumed(&self, session_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(session_id) {
            entry.consumed = true;
        }
    }

    /// Whether the session's entry has been marked consumed; `None` when the
    /// session is not tracked. Diagnostic accessor.
    pub fn is_consumed(&self, session_id: &str) -> Option<bool> {
        self.entries
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.consumed)
    }

    /// Publish an event to `session_id`, stamping a fresh event id into the
    /// payload.
    ///
    /// An existing entry is always reused, consumed or not; later events fan
    /// into a stream whose consumer is still attached. With no entry at all, a
    /// slot is stored so the session is tracked, but its receiver is dropped
    /// on the spot: frames pushed before a consumer attaches are lost, nothing
    /// is buffered.
    pub fn publish(
        &self,
        session_id: &str,
        category: Category,
        payload: Value,
    ) -> Result<EventId, Error> {
        if category.is_wildcard() {
            return Err(Error::invalid_category(
                category.as_str(),
                &Category::PUBLISHABLE,
            ));
        }

        let (resolution, stream) = {
            let mut entries = self.entries.lock().unwrap();
            match entries.entry(session_id.to_string()) {
                Entry::Occupied(occupied) => {
                    (Resolution::Reused, Arc::clone(&occupied.get().stream))
                }
                Entry::Vacant(vacant) => {
                    let (stream, receiver) = self.new_stream(session_id);
                    drop(receiver);
                    vacant.insert(SessionEntry {
                        stream: Arc::clone(&stream),
                        consumed: false,
                    });
                    (Resolution::Created, stream)
                }
            }
        };

        let envelope = Envelope::stamp(payload);
        let event_id = envelope.id().clone();
        stream.push(envelope.to_frame(category.as_str()));
        debug!("Session {session_id}: published {category} event {event_id} ({resolution:?})");

        Ok(event_id)
    }

    /// Drop the session's entry if it still holds the stream with `stream_id`.
    /// A replaced stream evicting itself late must not disturb its successor.
    pub fn remove(&self, session_id: &str, stream_id: &StreamId) {
        Self::evict(&self.entries, session_id, stream_id);
    }

    /// Number of tracked session entries, live consumers and waiting slots
    /// alike.
    pub fn stats(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Close every tracked stream. Snapshot first: each close re-enters the
    /// map through the stream's disconnect observer.
    pub fn close_all(&self) {
        let snapshot: Vec<Arc<EventStream>> = {
            let entries = self.entries.lock().unwrap();
            entries
                .values()
                .map(|entry| Arc::clone(&entry.stream))
                .collect()
        };

        for stream in snapshot {
            stream.close();
        }
    }

    fn new_stream(
        &self,
        session_id: &str,
    ) -> (Arc<EventStream>, UnboundedReceiver<Result<Event, Infallible>>) {
        let (stream, receiver) = EventStream::open();

        let evictor = Arc::downgrade(&self.entries);
        let key = session_id.to_string();
        stream.on_closed(move |stream_id| {
            if let Some(entries) = evictor.upgrade() {
                Self::evict(&entries, &key, stream_id);
            }
        });

        (stream, receiver)
    }

    fn evict(
        entries: &Mutex<HashMap<SessionId, SessionEntry>>,
        session_id: &str,
        stream_id: &StreamId,
    ) {
        let mut entries = entries.lock().unwrap();
        let matches = entries
            .get(session_id)
            .is_some_and(|entry| entry.stream.id() == stream_id);
        if matches {
            entries.remove(session_id);
            debug!("Session {session_id}: evicted stream {stream_id}");
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    #[test]
    fn test_attach_creates_entry_and_sends_handshake() {
        let registry = SessionRegistry::new();

        let (resolution, subscription) = registry.attach("session-1").unwrap();
        assert_eq!(resolution, Resolution::Created);
        assert_eq!(registry.stats(), 1);
        assert_eq!(registry.is_consumed("session-1"), Some(false));

        let (_, mut receiver, _guard) = subscription.into_parts();
        assert!(receiver.try_recv().is_ok());
        assert_eq!(receiver.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn test_attach_refused_while_consumer_is_draining() {
        let registry = SessionRegistry::new();

        let (_, subscription) = registry.attach("session-1").unwrap();

        // Refused whether or not the entry was marked consumed yet.
        let error = registry.attach("session-1").unwrap_err();
        assert_eq!(error.error_kind, ErrorKind::StreamConflict);

        registry.mark_consumed("session-1");
        let error = registry.attach("session-1").unwrap_err();
        assert_eq!(error.error_kind, ErrorKind::StreamConflict);

        drop(subscription);
    }

    #[test]
    fn test_attach_after_disconnect_creates_fresh_entry() {
        let registry = SessionRegistry::new();

        let (_, subscription) = registry.attach("session-1").unwrap();
        registry.mark_consumed("session-1");

        // Consumer disconnects; the guard closes and evicts the stream.
        drop(subscription);
        assert_eq!(registry.stats(), 0);

        let (resolution, _subscription) = registry.attach("session-1").unwrap();
        assert_eq!(resolution, Resolution::Created);
        assert_eq!(registry.is_consumed("session-1"), Some(false));
    }

    #[test]
    fn test_attach_replaces_entry_whose_consumer_departed() {
        let registry = SessionRegistry::new();

        let (_, subscription) = registry.attach("session-1").unwrap();
        let (_, receiver, old_guard) = subscription.into_parts();
        // Consumer gone, but the stream is not yet closed or evicted.
        drop(receiver);

        let (resolution, replacement) = registry.attach("session-1").unwrap();
        assert_eq!(resolution, Resolution::Replaced);
        assert_eq!(registry.stats(), 1);

        // The displaced stream's late eviction must not disturb the successor.
        drop(old_guard);
        assert_eq!(registry.stats(), 1);

        let (_, mut receiver, _guard) = replacement.into_parts();
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn test_publish_without_consumer_stores_a_slot() {
        let registry = SessionRegistry::new();

        let event_id = registry
            .publish("session-1", Category::Request, json!({ "state": "queued" }))
            .unwrap();

        assert!(!event_id.as_str().is_empty());
        assert_eq!(registry.stats(), 1);
        assert_eq!(registry.is_consumed("session-1"), Some(false));
    }

    #[test]
    fn test_attach_replaces_slot_left_by_publish() {
        let registry = SessionRegistry::new();

        registry
            .publish("session-1", Category::Request, json!({ "n": 1 }))
            .unwrap();

        let (resolution, subscription) = registry.attach("session-1").unwrap();
        assert_eq!(resolution, Resolution::Replaced);

        // Only the handshake arrives; the pre-attach event was not buffered.
        let (_, mut receiver, _guard) = subscription.into_parts();
        assert!(receiver.try_recv().is_ok());
        assert_eq!(receiver.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn test_publish_fans_into_consumed_live_stream() {
        let registry = SessionRegistry::new();

        let (_, subscription) = registry.attach("session-1").unwrap();
        registry.mark_consumed("session-1");

        registry
            .publish("session-1", Category::Update, json!({ "n": 1 }))
            .unwrap();
        registry
            .publish("session-1", Category::Update, json!({ "n": 2 }))
            .unwrap();

        // Handshake plus both published frames.
        let (_, mut receiver, _guard) = subscription.into_parts();
        let mut delivered = 0;
        while receiver.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, 3);
        assert_eq!(registry.stats(), 1);
    }

    #[test]
    fn test_publish_rejects_the_wildcard_category() {
        let registry = SessionRegistry::new();

        let error = registry
            .publish("session-1", Category::All, json!({}))
            .unwrap_err();
        match error.error_kind {
            ErrorKind::InvalidCategory { allowed, .. } => {
                assert_eq!(allowed, &Category::PUBLISHABLE);
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert_eq!(registry.stats(), 0);
    }

    #[test]
    fn test_mark_consumed_ignores_untracked_sessions() {
        let registry = SessionRegistry::new();
        registry.mark_consumed("missing");
        assert_eq!(registry.is_consumed("missing"), None);
    }

    #[test]
    fn test_remove_is_scoped_to_the_exact_stream() {
        let registry = SessionRegistry::new();

        let (_, subscription) = registry.attach("session-1").unwrap();
        let stale_id = StreamId::new();

        registry.remove("session-1", &stale_id);
        assert_eq!(registry.stats(), 1);

        registry.remove("session-1", subscription.stream_id());
        assert_eq!(registry.stats(), 0);
    }

    #[test]
    fn test_close_all_ends_tracked_streams() {
        let registry = SessionRegistry::new();

        let (_, subscription) = registry.attach("session-1").unwrap();
        registry
            .publish("session-2", Category::Update, json!({}))
            .unwrap();
        assert_eq!(registry.stats(), 2);

        registry.close_all();
        assert_eq!(registry.stats(), 0);

        let (_, mut receiver, _guard) = subscription.into_parts();
        assert!(receiver.try_recv().is_ok());
        assert_eq!(receiver.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_attaches_admit_exactly_one_consumer() {
        let registry = SessionRegistry::new();

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { registry.attach("session-1") }));
        }

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }

        let admitted = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(admitted, 1);
        assert!(outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(|error| error.error_kind == ErrorKind::StreamConflict));
        assert_eq!(registry.stats(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_publishes_share_one_entry() {
        let registry = SessionRegistry::new();

        let mut tasks = Vec::new();
        for n in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.publish("session-1", Category::Update, json!({ "n": n }))
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(registry.stats(), 1);
    }
}
