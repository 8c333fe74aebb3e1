use crate::Error;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use std::collections::HashMap;

pub(crate) struct SessionId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Error;

    // Session routes identify their caller by an opaque session id, carried in
    // the x-session-id header or, for clients that cannot set headers on an
    // EventSource, the sessionId query parameter. The header wins when both
    // are present. Requests carrying neither are rejected as unauthorized.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get("x-session-id") {
            if let Ok(session_id) = value.to_str() {
                if !session_id.is_empty() {
                    return Ok(SessionId(session_id.to_string()));
                }
            }
        }

        if let Ok(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
            if let Some(session_id) = query.get("sessionId") {
                if !session_id.is_empty() {
                    return Ok(SessionId(session_id.clone()));
                }
            }
        }

        Err(Error::from(sse::error::Error::missing_session_id()))
    }
}
