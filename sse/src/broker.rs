use crate::broadcast::BroadcastRegistry;
use crate::category::Category;
use crate::envelope::{Envelope, EventId};
use crate::error::Error;
use crate::session::{Resolution, SessionRegistry};
use crate::stream::Subscription;
use log::*;
use serde_json::Value;
use std::collections::BTreeMap;

/// Facade over both stream registries. One broker lives for the whole process;
/// the web layer picks the broadcast or session surface per its serving mode.
pub struct Broker {
    broadcast: BroadcastRegistry,
    sessions: SessionRegistry,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            broadcast: BroadcastRegistry::new(),
            sessions: SessionRegistry::new(),
        }
    }

    /// Open a broadcast subscription under `category`.
    pub fn subscribe(&self, category: Category) -> Subscription {
        self.broadcast.subscribe(category)
    }

    /// Publish an event to every subscriber of `category` plus every wildcard
    /// subscriber.
    ///
    /// The envelope is stamped once, so all targets observe the same event id.
    pub fn publish(&self, category: Category, payload: Value) -> Result<EventId, Error> {
        let targets = self.broadcast.resolve_targets(category)?;

        let envelope = Envelope::stamp(payload);
        let frame = envelope.to_frame(category.as_str());
        for target in &targets {
            target.push(frame.clone());
        }
        debug!(
            "Published {category} event {} to {} stream(s)",
            envelope.id(),
            targets.len()
        );

        Ok(envelope.id().clone())
    }

    /// Attach the single consumer for `session_id`.
    pub fn attach_session(&self, session_id: &str) -> Result<(Resolution, Subscription), Error> {
        self.sessions.attach(session_id)
    }

    /// Flag the session's stream as consumed once its GET connection is being
    /// served.
    pub fn mark_consumed(&self, session_id: &str) {
        self.sessions.mark_consumed(session_id)
    }

    /// Publish an event to a single session's stream.
    pub fn publish_to_session(
        &self,
        session_id: &str,
        category: Category,
        payload: Value,
    ) -> Result<EventId, Error> {
        self.sessions.publish(session_id, category, payload)
    }

    /// Subscriber counts per category for the broadcast variant.
    pub fn broadcast_stats(&self) -> BTreeMap<Category, usize> {
        self.broadcast.stats()
    }

    /// Tracked entry count for the session variant.
    pub fn session_stats(&self) -> usize {
        self.sessions.stats()
    }

    /// Close every stream in both registries. Called once at shutdown so
    /// consumers see a clean end of stream instead of a dropped connection.
    pub fn shutdown(&self) {
        self.broadcast.close_all();
        self.sessions.close_all();
        info!("Closed all event streams");
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
