use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sse::error::{Error as SseError, ErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(SseError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

// Every error body uses the same envelope: {"error": "<client-facing message>"}.
// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = match self.0.error_kind {
            ErrorKind::InvalidCategory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::WildcardPublish => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::MissingSessionId => StatusCode::UNAUTHORIZED,
            ErrorKind::StreamConflict => StatusCode::CONFLICT,
        };

        (status_code, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<SseError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
