//! Server-Sent Events (SSE) hub for relaying published events to subscribers.
//!
//! This crate holds the transport-agnostic core of the event relay: stream
//! registries, the publish fan-out, and the event envelope. The web layer owns
//! HTTP concerns and talks to this crate through the [`Broker`] facade.
//!
//! # Architecture
//!
//! - **Two serving variants**: anonymous broadcast (any number of subscribers
//!   per category, wildcard included) and session streams (one consumer per
//!   session id, with conflict detection). Both registries exist in every
//!   process; the deployment's serving mode decides which surface is routed.
//! - **Push channels**: every subscriber owns the receiving half of an
//!   unbounded channel; registries keep the sending half inside an
//!   [`stream::EventStream`] and never block on delivery.
//! - **Ephemeral events**: nothing is buffered or replayed. A frame pushed
//!   while no consumer is attached is lost by contract.
//! - **Self-evicting streams**: each stream carries a disconnect observer that
//!   removes exactly that stream from its registry, however the connection
//!   ends.
//! - **Stamped envelopes**: every publish gets a server-generated event id
//!   merged into its payload; fan-out targets all observe the same id.
//!
//! # Event Flow
//!
//! 1. A consumer subscribes (by category, or by session id) and receives a
//!    `handshake` frame carrying its stream id
//! 2. A producer publishes a JSON payload under a category
//! 3. The broker stamps the envelope and resolves the target streams:
//!    category subscribers plus wildcard subscribers, or the session's stream
//! 4. Frames are pushed onto each target's channel; the web layer drains the
//!    channel into the SSE response body
//! 5. When the consumer disconnects, the stream closes and evicts itself
//!
//! # Example: publishing an event
//!
//! ```rust,ignore
//! use sse::category::Category;
//! use serde_json::json;
//!
//! // In a controller after a state change
//! let event_id = app_state
//!     .broker
//!     .publish(Category::Update, json!({ "status": "ready" }))?;
//! ```
//!
//! # Modules
//!
//! - `broadcast`: category-keyed registry with wildcard fan-out
//! - `broker`: process-wide facade over both registries
//! - `category`: the closed category set and its parsing rules
//! - `envelope`: event id stamping and SSE frame construction
//! - `error`: root Error struct and error kinds
//! - `session`: session-keyed registry with single-consumer semantics
//! - `stream`: push channel wrapper, disconnect observer, stream guard
pub mod broadcast;
pub mod broker;
pub mod category;
pub mod envelope;
pub mod error;
pub mod session;
pub mod stream;

pub use broker::Broker;
