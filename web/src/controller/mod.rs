use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use sse::stream::Subscription;
use std::convert::Infallible;
use std::time::Duration;

pub(crate) mod broadcast_events_controller;
pub(crate) mod health_check_controller;
pub(crate) mod session_events_controller;

/// Turn a registered subscription into an SSE response.
///
/// The stream guard rides inside the response body: when the client
/// disconnects, axum drops the body, the guard closes the stream, and the
/// stream evicts itself from its registry. A server-side close instead ends
/// the frame loop, which terminates the response cleanly.
pub(crate) fn sse_response(
    subscription: Subscription,
    keep_alive_secs: u64,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (stream_id, mut receiver, guard) = subscription.into_parts();

    let stream = stream! {
        let _guard = guard;
        while let Some(frame) = receiver.recv().await {
            yield frame;
        }

        debug!("SSE stream {stream_id} ended by the server");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(keep_alive_secs)))
}
