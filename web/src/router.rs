use crate::controller::{
    broadcast_events_controller, health_check_controller, session_events_controller,
};
use crate::AppState;
use axum::{
    http::{
        header::{HeaderName, HeaderValue, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use log::*;
use service::config::{Config, StreamMode};
use tower_http::cors::CorsLayer;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. Both serving modes mount
// the same paths under /events, so each mode carries its own spec and the
// router picks the matching one.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Event Relay API (broadcast mode)"
        ),
        paths(
            broadcast_events_controller::subscribe,
            broadcast_events_controller::publish,
            broadcast_events_controller::stats,
            health_check_controller::health_check,
        ),
        tags(
            (name = "event_relay", description = "SSE fan-out hub for category-scoped event streams")
        )
    )]
struct BroadcastApiDoc;

#[derive(OpenApi)]
#[openapi(
        info(
            title = "Event Relay API (session mode)"
        ),
        paths(
            session_events_controller::subscribe,
            session_events_controller::publish,
            session_events_controller::stats,
            health_check_controller::health_check,
        ),
        tags(
            (name = "event_relay", description = "SSE hub for session-scoped single-consumer event streams")
        )
    )]
struct SessionApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let api_doc = match app_state.config.stream_mode {
        StreamMode::Broadcast => BroadcastApiDoc::openapi(),
        StreamMode::Session => SessionApiDoc::openapi(),
    };

    let event_routes = match app_state.config.stream_mode {
        StreamMode::Broadcast => broadcast_event_routes(app_state.clone()),
        StreamMode::Session => session_event_routes(app_state.clone()),
    };

    Router::new()
        .merge(event_routes)
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", api_doc).path("/rapidoc"))
        .layer(cors_layer(&app_state.config))
}

fn broadcast_event_routes(app_state: AppState) -> Router {
    Router::new()
        // /events/stats is static and takes precedence over the capture below
        .route("/events/stats", get(broadcast_events_controller::stats))
        .route(
            "/events/:category",
            get(broadcast_events_controller::subscribe),
        )
        .route(
            "/events/:category",
            post(broadcast_events_controller::publish),
        )
        .with_state(app_state)
}

fn session_event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events/stats", get(session_events_controller::stats))
        .route(
            "/events/:category",
            get(session_events_controller::subscribe),
        )
        .route(
            "/events/:category",
            post(session_events_controller::publish),
        )
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping malformed allowed origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-session-id")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use sse::Broker;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_config(stream_mode: StreamMode) -> Config {
        Config {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            stream_mode,
            sse_keep_alive_secs: 15,
            interface: "127.0.0.1".to_string(),
            port: 4000,
            log_level_filter: LevelFilter::Info,
        }
    }

    fn test_app(stream_mode: StreamMode) -> (Router, Arc<Broker>) {
        let broker = Arc::new(Broker::new());
        let app_state = AppState::new(test_config(stream_mode), &broker);
        (define_routes(app_state), broker)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_session_request(uri: &str, session_id: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-session-id", session_id)
            .body(Body::empty())
            .unwrap()
    }

    fn post_request(uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    fn post_session_request(uri: &str, session_id: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-session-id", session_id)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Collect a finished SSE body into (event name, parsed data) frames.
    /// Keep-alive comments carry no event or data line and are skipped.
    async fn sse_frames(response: axum::response::Response) -> Vec<(String, Value)> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let raw = std::str::from_utf8(&bytes).unwrap();

        raw.split("\n\n")
            .filter_map(|chunk| {
                let mut event = None;
                let mut data = None;
                for line in chunk.lines() {
                    if let Some(rest) = line.strip_prefix("event:") {
                        event = Some(rest.trim_start().to_string());
                    } else if let Some(rest) = line.strip_prefix("data:") {
                        data = serde_json::from_str(rest.trim_start()).ok();
                    }
                }
                Some((event?, data?))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_health_check_responds() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_spec_is_served() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let response = app
            .oneshot(get_request("/api-docs/openapi.json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let spec = body_json(response).await;
        assert!(spec["paths"]["/events/{category}"].is_object());
        assert!(spec["paths"]["/events/stats"].is_object());
        assert!(spec["paths"]["/health"].is_object());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_unknown_category() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let response = app.oneshot(get_request("/events/bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Invalid event category. Must be one of: botError, update, request, all"
        );
    }

    #[tokio::test]
    async fn test_publish_rejects_the_wildcard() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let response = app
            .oneshot(post_request("/events/all", json!({ "n": 1 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Cannot publish events of category \"all\". Must be one of: botError, update, request"
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_accepted() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let response = app
            .oneshot(post_request("/events/update", json!({ "n": 1 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_broadcast_stats_report_all_categories() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let response = app.oneshot(get_request("/events/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({ "streams": { "botError": 0, "update": 0, "request": 0, "all": 0 } })
        );
    }

    #[tokio::test]
    async fn test_subscriber_streams_carry_handshake_and_shared_event_id() {
        let (app, broker) = test_app(StreamMode::Broadcast);

        let update_response = app.clone().oneshot(get_request("/events/update")).await.unwrap();
        assert_eq!(update_response.status(), StatusCode::OK);
        assert_eq!(update_response.headers()["content-type"], "text/event-stream");

        let wildcard_response = app.clone().oneshot(get_request("/events/all")).await.unwrap();
        assert_eq!(wildcard_response.status(), StatusCode::OK);

        let publish_response = app
            .clone()
            .oneshot(post_request("/events/update", json!({ "outcome": "done" })))
            .await
            .unwrap();
        assert_eq!(publish_response.status(), StatusCode::NO_CONTENT);

        // End the streams server-side so the response bodies complete.
        broker.shutdown();

        let update_frames = sse_frames(update_response).await;
        let wildcard_frames = sse_frames(wildcard_response).await;

        assert_eq!(update_frames.len(), 2);
        assert_eq!(update_frames[0].0, "handshake");
        assert!(update_frames[0].1["id"].is_string());
        assert_eq!(update_frames[1].0, "update");
        assert_eq!(update_frames[1].1["outcome"], "done");

        // One publish, one event id, observed identically on both streams.
        assert_eq!(wildcard_frames.len(), 2);
        assert_eq!(update_frames[1].1["id"], wildcard_frames[1].1["id"]);

        // The event id is fresh, not the handshake id reused.
        assert_ne!(update_frames[1].1["id"], update_frames[0].1["id"]);
    }

    #[tokio::test]
    async fn test_broadcast_stats_track_live_subscribers() {
        let (app, _broker) = test_app(StreamMode::Broadcast);

        let subscriber = app.clone().oneshot(get_request("/events/update")).await.unwrap();
        assert_eq!(subscriber.status(), StatusCode::OK);

        let response = app.clone().oneshot(get_request("/events/stats")).await.unwrap();
        assert_eq!(body_json(response).await["streams"]["update"], 1);

        // Dropping the response body closes and evicts the stream.
        drop(subscriber);

        let response = app.oneshot(get_request("/events/stats")).await.unwrap();
        assert_eq!(body_json(response).await["streams"]["update"], 0);
    }

    #[tokio::test]
    async fn test_session_routes_require_a_session_id() {
        let (app, _broker) = test_app(StreamMode::Session);

        let response = app
            .clone()
            .oneshot(get_request("/events/update"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_request("/events/update", json!({ "n": 1 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_routes_reject_the_wildcard_category() {
        let (app, _broker) = test_app(StreamMode::Session);

        let response = app
            .clone()
            .oneshot(get_session_request("/events/all", "session-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Invalid event category. Must be one of: botError, update, request"
        );

        let response = app
            .oneshot(post_session_request(
                "/events/all",
                "session-1",
                json!({ "n": 1 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_session_accepts_query_parameter_session_id() {
        let (app, _broker) = test_app(StreamMode::Session);

        let response = app
            .oneshot(get_request("/events/update?sessionId=qp-session"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_stream_lifecycle() {
        let (app, broker) = test_app(StreamMode::Session);

        // Publish before any consumer: accepted, tracked as a waiting slot,
        // but the event itself is not buffered.
        let response = app
            .clone()
            .oneshot(post_session_request(
                "/events/request",
                "session-1",
                json!({ "state": "queued" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.clone().oneshot(get_request("/events/stats")).await.unwrap();
        assert_eq!(body_json(response).await, json!({ "streams": 1 }));

        // First GET attaches the single consumer.
        let consumer = app
            .clone()
            .oneshot(get_session_request("/events/request", "session-1"))
            .await
            .unwrap();
        assert_eq!(consumer.status(), StatusCode::OK);

        // A second GET for the same session conflicts while the first lives.
        let response = app
            .clone()
            .oneshot(get_session_request("/events/request", "session-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Event stream for this session has already been consumed."
        );

        // Publishing now reaches the attached consumer.
        let response = app
            .clone()
            .oneshot(post_session_request(
                "/events/request",
                "session-1",
                json!({ "state": "done" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        broker.shutdown();

        let frames = sse_frames(consumer).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, "handshake");
        assert_eq!(frames[1].0, "request");
        assert_eq!(frames[1].1["state"], "done");
        assert!(frames[1].1["id"].is_string());
    }

    #[tokio::test]
    async fn test_session_reattach_after_disconnect() {
        let (app, _broker) = test_app(StreamMode::Session);

        let first = app
            .clone()
            .oneshot(get_session_request("/events/update", "session-1"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        // Consumer disconnects; its stream is evicted and the session is free
        // for a fresh attach.
        drop(first);

        let second = app
            .oneshot(get_session_request("/events/update", "session-1"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_stats_count_tracked_sessions() {
        let (app, _broker) = test_app(StreamMode::Session);

        for session_id in ["session-1", "session-2"] {
            let response = app
                .clone()
                .oneshot(post_session_request(
                    "/events/update",
                    session_id,
                    json!({ "n": 1 }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let response = app.oneshot(get_request("/events/stats")).await.unwrap();
        assert_eq!(body_json(response).await, json!({ "streams": 2 }));
    }
}
