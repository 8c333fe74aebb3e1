use crate::stream::StreamId;
use axum::response::sse::Event;
use serde_json::{json, Value};

/// Unique identifier stamped onto every published event (server-generated).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A publish payload with its server-assigned event id merged in.
///
/// The envelope is built once per publish; fan-out clones the resulting wire
/// frame so every target observes the same id.
#[derive(Debug, Clone)]
pub struct Envelope {
    id: EventId,
    data: Value,
}

impl Envelope {
    /// Stamp a fresh event id into `payload`.
    ///
    /// Object payloads keep their fields, with any caller-supplied `id`
    /// overwritten. Non-object payloads carry no fields the id could join, so
    /// they collapse to a bare `{"id": ...}` envelope.
    pub fn stamp(payload: Value) -> Self {
        let id = EventId::new();
        let data = match payload {
            Value::Object(mut fields) => {
                fields.insert("id".to_string(), Value::String(id.to_string()));
                Value::Object(fields)
            }
            _ => json!({ "id": id.as_str() }),
        };

        Self { id, data }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Build the SSE wire frame, tagged with the category name.
    pub fn to_frame(&self, tag: &str) -> Event {
        Event::default().event(tag).data(self.data.to_string())
    }
}

/// First frame pushed on every new stream. Carries the stream's own id so the
/// client can correlate later diagnostics with this connection.
pub fn handshake(stream_id: &StreamId) -> Event {
    let data = json!({ "id": stream_id.as_str() });
    Event::default().event("handshake").data(data.to_string())
}
