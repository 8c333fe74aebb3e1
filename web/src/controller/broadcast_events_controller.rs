use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::controller::sse_response;
use crate::{AppState, Error};
use log::*;
use sse::category;

/// GET an SSE subscription to a broadcast event category
#[utoipa::path(
    get,
    path = "/events/{category}",
    params(
        ("category" = String, Path, description = "Event category to subscribe to: botError, update, request, or the wildcard all")
    ),
    responses(
        (status = 200, description = "SSE stream opened; first frame is the handshake", body = String, content_type = "text/event-stream"),
        (status = 422, description = "Unknown event category")
    )
)]
pub async fn subscribe(
    State(app_state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET subscribe to event category: {category}");

    let category = category::broadcast_category(&category)?;
    let subscription = app_state.broker.subscribe(category);

    Ok(sse_response(
        subscription,
        app_state.config.sse_keep_alive_secs,
    ))
}

/// POST publish an event to every subscriber of a category
#[utoipa::path(
    post,
    path = "/events/{category}",
    params(
        ("category" = String, Path, description = "Event category to publish under: botError, update, or request")
    ),
    responses(
        (status = 204, description = "Event accepted and fanned out to current subscribers"),
        (status = 422, description = "Unknown event category, or an attempted publish under the wildcard")
    )
)]
pub async fn publish(
    State(app_state): State<AppState>,
    Path(category): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST publish event to category: {category}");

    let category = category::broadcast_category(&category)?;
    let event_id = app_state.broker.publish(category, payload)?;

    debug!("Published event {event_id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET live subscriber counts per event category
#[utoipa::path(
    get,
    path = "/events/stats",
    responses(
        (status = 200, description = "Subscriber counts per category, zeros included")
    )
)]
pub async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("GET broadcast stream stats");

    Json(json!({ "streams": app_state.broker.broadcast_stats() }))
}
