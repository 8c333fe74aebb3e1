use crate::api_client::ApiClient;
use crate::sse_client::Connection;
use anyhow::{Context, Result};
use colored::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// How long to wait for an event we expect to arrive.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to watch a stream that should stay quiet.
const QUIET_WINDOW: Duration = Duration::from_millis(750);

/// Grace period for the relay to notice a dropped connection.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

impl TestResult {
    fn pass(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            details: details.into(),
        }
    }

    fn fail(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            details: details.into(),
        }
    }
}

/// A fresh subscription greets the client with a handshake frame carrying the
/// stream id. Relay must run in broadcast mode.
pub async fn test_handshake(base_url: &str) -> Result<TestResult> {
    let name = "handshake";

    println!("{} Subscribing to the update category...", "→".blue());
    let mut subscriber =
        Connection::establish(base_url, "update", None, "update subscriber".to_string()).await?;

    let handshake = subscriber.wait_for_event("handshake", EVENT_TIMEOUT).await?;
    let Some(stream_id) = handshake.data["id"].as_str() else {
        return Ok(TestResult::fail(name, "handshake carried no stream id"));
    };

    println!("{} Handshake received (stream ID: {})", "✓".green(), stream_id);
    Ok(TestResult::pass(name, format!("stream id {stream_id}")))
}

/// A publish reaches every same-category subscriber with one shared event id,
/// and leaves other categories untouched. Relay must run in broadcast mode.
pub async fn test_fanout(api_client: &ApiClient, base_url: &str) -> Result<TestResult> {
    let name = "fanout";

    println!("{} Subscribing two update streams and one botError stream...", "→".blue());
    let mut first =
        Connection::establish(base_url, "update", None, "update subscriber 1".to_string()).await?;
    let mut second =
        Connection::establish(base_url, "update", None, "update subscriber 2".to_string()).await?;
    let mut bystander =
        Connection::establish(base_url, "botError", None, "botError subscriber".to_string())
            .await?;

    first.wait_for_event("handshake", EVENT_TIMEOUT).await?;
    second.wait_for_event("handshake", EVENT_TIMEOUT).await?;
    bystander.wait_for_event("handshake", EVENT_TIMEOUT).await?;

    let marker = Uuid::new_v4().to_string();
    api_client
        .publish("update", None, &json!({ "marker": marker }))
        .await?;

    let event1 = first.wait_for_event("update", EVENT_TIMEOUT).await?;
    let event2 = second.wait_for_event("update", EVENT_TIMEOUT).await?;

    if event1.data["marker"].as_str() != Some(marker.as_str()) {
        return Ok(TestResult::fail(name, "delivered payload lost the marker"));
    }
    if event1.data["id"] != event2.data["id"] {
        return Ok(TestResult::fail(name, "event ids diverged across subscribers"));
    }
    println!("{} Both update subscribers received the event", "✓".green());

    if let Some(stray) = bystander.next_event(QUIET_WINDOW).await {
        return Ok(TestResult::fail(
            name,
            format!("botError subscriber saw a stray {} event", stray.event_type),
        ));
    }
    println!("{} botError subscriber stayed quiet", "✓".green());

    Ok(TestResult::pass(name, "one event, both subscribers, one id"))
}

/// Wildcard subscribers observe every category, and the wildcard itself is
/// not publishable. Relay must run in broadcast mode.
pub async fn test_wildcard(api_client: &ApiClient, base_url: &str) -> Result<TestResult> {
    let name = "wildcard";

    println!("{} Subscribing to the all category...", "→".blue());
    let mut wildcard =
        Connection::establish(base_url, "all", None, "wildcard subscriber".to_string()).await?;
    wildcard.wait_for_event("handshake", EVENT_TIMEOUT).await?;

    api_client.publish("update", None, &json!({ "n": 1 })).await?;
    api_client
        .publish("botError", None, &json!({ "reason": "probe" }))
        .await?;

    wildcard.wait_for_event("update", EVENT_TIMEOUT).await?;
    wildcard.wait_for_event("botError", EVENT_TIMEOUT).await?;
    println!("{} Wildcard subscriber saw both categories", "✓".green());

    let (status, body) = api_client
        .try_publish("all", None, &json!({ "n": 2 }))
        .await?;
    if status != StatusCode::UNPROCESSABLE_ENTITY {
        return Ok(TestResult::fail(
            name,
            format!("publishing to all returned {status} instead of 422: {body}"),
        ));
    }
    println!("{} Publishing to the all category was rejected", "✓".green());

    Ok(TestResult::pass(name, "saw update and botError, publish to all rejected"))
}

/// /events/stats tracks subscriptions as they come and go. Relay must run in
/// broadcast mode.
pub async fn test_stats(api_client: &ApiClient, _base_url: &str) -> Result<TestResult> {
    let name = "stats";

    let baseline = api_client.stats().await?["streams"]["request"]
        .as_i64()
        .context("stats missing the request count")?;

    println!("{} Opening a request stream...", "→".blue());
    let subscriber = api_client.open_stream("request", None).await?;
    if subscriber.status() != StatusCode::OK {
        return Ok(TestResult::fail(
            name,
            format!("subscribe returned {}", subscriber.status()),
        ));
    }

    let live = api_client.stats().await?["streams"]["request"]
        .as_i64()
        .context("stats missing the request count")?;
    if live != baseline + 1 {
        return Ok(TestResult::fail(
            name,
            format!("expected {} live request streams, saw {}", baseline + 1, live),
        ));
    }
    println!("{} Stats picked up the new stream", "✓".green());

    drop(subscriber);
    tokio::time::sleep(DISCONNECT_GRACE).await;

    let after = api_client.stats().await?["streams"]["request"]
        .as_i64()
        .context("stats missing the request count")?;
    if after != baseline {
        return Ok(TestResult::fail(
            name,
            format!("expected {} request streams after disconnect, saw {}", baseline, after),
        ));
    }
    println!("{} Stats dropped the stream after disconnect", "✓".green());

    Ok(TestResult::pass(name, "count rose and fell with the stream"))
}

/// Attach, conflict, publish, and delivery for a single session. Relay must
/// run in session mode.
pub async fn test_session_lifecycle(api_client: &ApiClient, base_url: &str) -> Result<TestResult> {
    let name = "session-lifecycle";
    let session_id = Uuid::new_v4().to_string();

    println!("{} Using session {}", "→".blue(), session_id);

    // A publish before any consumer is accepted but never buffered.
    api_client
        .publish("request", Some(&session_id), &json!({ "state": "queued" }))
        .await?;

    println!("{} Attaching the session consumer...", "→".blue());
    let mut consumer = Connection::establish(
        base_url,
        "request",
        Some(&session_id),
        "session consumer".to_string(),
    )
    .await?;
    consumer.wait_for_event("handshake", EVENT_TIMEOUT).await?;

    // A second attach for the same session must conflict while the first lives.
    let rival = api_client.open_stream("request", Some(&session_id)).await?;
    if rival.status() != StatusCode::CONFLICT {
        return Ok(TestResult::fail(
            name,
            format!("second attach returned {} instead of 409", rival.status()),
        ));
    }
    drop(rival);
    println!("{} Second attach was rejected with 409", "✓".green());

    api_client
        .publish("request", Some(&session_id), &json!({ "state": "done" }))
        .await?;

    let event = consumer.wait_for_event("request", EVENT_TIMEOUT).await?;
    if event.data["state"].as_str() != Some("done") {
        return Ok(TestResult::fail(
            name,
            format!("expected the post-attach payload, got {}", event.data),
        ));
    }
    println!("{} Post-attach publish was delivered", "✓".green());

    if let Some(stray) = consumer.next_event(QUIET_WINDOW).await {
        return Ok(TestResult::fail(
            name,
            format!("unexpected extra {} event on the session stream", stray.event_type),
        ));
    }

    let (status, _body) = api_client
        .try_publish("all", Some(&session_id), &json!({ "n": 1 }))
        .await?;
    if status != StatusCode::UNPROCESSABLE_ENTITY {
        return Ok(TestResult::fail(
            name,
            format!("publishing to all returned {status} instead of 422"),
        ));
    }
    println!("{} Wildcard publish was rejected", "✓".green());

    Ok(TestResult::pass(name, "attach, conflict, and delivery all behaved"))
}

/// A session frees up for a fresh attach once its consumer disconnects.
/// Relay must run in session mode.
pub async fn test_session_reattach(api_client: &ApiClient, _base_url: &str) -> Result<TestResult> {
    let name = "session-reattach";
    let session_id = Uuid::new_v4().to_string();

    println!("{} Attaching and dropping a consumer...", "→".blue());
    let first = api_client.open_stream("update", Some(&session_id)).await?;
    if first.status() != StatusCode::OK {
        return Ok(TestResult::fail(
            name,
            format!("first attach returned {}", first.status()),
        ));
    }
    drop(first);
    tokio::time::sleep(DISCONNECT_GRACE).await;

    let second = api_client.open_stream("update", Some(&session_id)).await?;
    if second.status() != StatusCode::OK {
        return Ok(TestResult::fail(
            name,
            format!("re-attach returned {} instead of 200", second.status()),
        ));
    }
    println!("{} Session accepted a fresh consumer", "✓".green());

    Ok(TestResult::pass(name, "session recovered after disconnect"))
}
