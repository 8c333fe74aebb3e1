use crate::category::Category;
use crate::envelope;
use crate::error::Error;
use crate::stream::{EventStream, StreamId, Subscription};
use dashmap::DashMap;
use log::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry for the anonymous broadcast variant: any number of subscribers per
/// category, with wildcard subscribers receiving every published event.
#[derive(Clone)]
pub struct BroadcastRegistry {
    /// Category → live streams. Entries are created lazily on first subscribe.
    streams: Arc<DashMap<Category, Vec<Arc<EventStream>>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
        }
    }

    /// Open a stream under `category` and register it for fan-out.
    ///
    /// The handshake frame is queued before the stream becomes reachable by
    /// publishers, so it is always the first frame a consumer observes.
    pub fn subscribe(&self, category: Category) -> Subscription {
        let (stream, receiver) = EventStream::open();
        stream.push(envelope::handshake(stream.id()));

        let evictor = Arc::downgrade(&self.streams);
        stream.on_closed(move |stream_id| {
            if let Some(streams) = evictor.upgrade() {
                Self::evict(&streams, category, stream_id);
            }
        });

        self.streams
            .entry(category)
            .or_default()
            .push(Arc::clone(&stream));
        info!("Registered {category} subscriber on stream {}", stream.id());

        Subscription::new(&stream, receiver)
    }

    /// Collect the streams a publish under `category` must reach: the
    /// category's own subscribers plus every wildcard subscriber.
    ///
    /// Publishing under the wildcard itself is rejected; it is a subscription
    /// filter, not an addressable category.
    pub fn resolve_targets(&self, category: Category) -> Result<Vec<Arc<EventStream>>, Error> {
        if category.is_wildcard() {
            return Err(Error::wildcard_publish());
        }

        let mut targets = self
            .streams
            .get(&category)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        if let Some(wildcard) = self.streams.get(&Category::All) {
            targets.extend(wildcard.value().iter().cloned());
        }

        Ok(targets)
    }

    /// Drop the stream with `stream_id` from `category`, if it is still
    /// registered there. Closing the stream is the caller's business; this is
    /// bookkeeping only.
    pub fn remove(&self, category: Category, stream_id: &StreamId) {
        Self::evict(&self.streams, category, stream_id);
    }

    fn evict(
        streams: &DashMap<Category, Vec<Arc<EventStream>>>,
        category: Category,
        stream_id: &StreamId,
    ) {
        if let Some(mut entry) = streams.get_mut(&category) {
            let before = entry.len();
            entry.retain(|stream| stream.id() != stream_id);
            if entry.len() < before {
                debug!("Removed {category} subscriber stream {stream_id}");
            }
        }
    }

    /// Live subscriber counts per category, zeros included.
    pub fn stats(&self) -> BTreeMap<Category, usize> {
        Category::VALUES
            .iter()
            .map(|&category| {
                let count = self
                    .streams
                    .get(&category)
                    .map(|entry| entry.len())
                    .unwrap_or(0);
                (category, count)
            })
            .collect()
    }

    /// Close every registered stream. Snapshot first: each close re-enters the
    /// map through the stream's disconnect observer.
    pub fn close_all(&self) {
        let snapshot: Vec<Arc<EventStream>> = self
            .streams
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();

        for stream in snapshot {
            stream.close();
        }
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
