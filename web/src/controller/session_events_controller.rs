use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::controller::sse_response;
use crate::extractors::session_id::SessionId;
use crate::{AppState, Error};
use log::*;
use sse::category;

/// GET the single SSE stream for a session
#[utoipa::path(
    get,
    path = "/events/{category}",
    params(
        ("category" = String, Path, description = "Event category: botError, update, or request. Validated, then ignored for stream keying"),
        ("x-session-id" = Option<String>, Header, description = "Session id identifying the stream to attach to"),
        ("sessionId" = Option<String>, Query, description = "Fallback session id for clients that cannot set headers")
    ),
    responses(
        (status = 200, description = "SSE stream opened; first frame is the handshake", body = String, content_type = "text/event-stream"),
        (status = 401, description = "No session id supplied"),
        (status = 409, description = "The session's stream already has a consumer"),
        (status = 422, description = "Unknown event category")
    )
)]
pub async fn subscribe(
    State(app_state): State<AppState>,
    SessionId(session_id): SessionId,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET session stream for category: {category}");

    let category = category::session_category(&category)?;
    let (resolution, subscription) = app_state.broker.attach_session(&session_id)?;
    app_state.broker.mark_consumed(&session_id);

    debug!("Session {session_id}: serving {category} stream ({resolution:?})");
    Ok(sse_response(
        subscription,
        app_state.config.sse_keep_alive_secs,
    ))
}

/// POST publish an event to a single session's stream
#[utoipa::path(
    post,
    path = "/events/{category}",
    params(
        ("category" = String, Path, description = "Event category to publish under: botError, update, or request"),
        ("x-session-id" = Option<String>, Header, description = "Session id whose stream receives the event"),
        ("sessionId" = Option<String>, Query, description = "Fallback session id for clients that cannot set headers")
    ),
    responses(
        (status = 204, description = "Event accepted; delivered if the session's consumer is attached"),
        (status = 401, description = "No session id supplied"),
        (status = 422, description = "Unknown event category, or the wildcard")
    )
)]
pub async fn publish(
    State(app_state): State<AppState>,
    SessionId(session_id): SessionId,
    Path(category): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST publish session event to category: {category}");

    let category = category::session_category(&category)?;
    let event_id = app_state
        .broker
        .publish_to_session(&session_id, category, payload)?;

    debug!("Published event {event_id} for session {session_id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET the number of tracked session streams
#[utoipa::path(
    get,
    path = "/events/stats",
    responses(
        (status = 200, description = "Count of tracked session entries, waiting slots included")
    )
)]
pub async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("GET session stream stats");

    Json(json!({ "streams": app_state.broker.session_stats() }))
}
