//! Error types for the `sse` crate.
//!
//! Follows a root Error struct with an error kind enum, holding an optional
//! source for error chaining.

use crate::category::Category;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the sse crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Everything that can go wrong while subscribing to or publishing events.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The supplied category is not in the set accepted by the route.
    InvalidCategory {
        supplied: String,
        allowed: &'static [Category],
    },
    /// A publish was attempted under the wildcard category.
    WildcardPublish,
    /// A session route was hit without a session id.
    MissingSessionId,
    /// The session already has a live event stream attached.
    StreamConflict,
}

impl Error {
    pub fn invalid_category(supplied: impl Into<String>, allowed: &'static [Category]) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::InvalidCategory {
                supplied: supplied.into(),
                allowed,
            },
        }
    }

    pub fn wildcard_publish() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::WildcardPublish,
        }
    }

    pub fn missing_session_id() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::MissingSessionId,
        }
    }

    pub fn stream_conflict() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::StreamConflict,
        }
    }
}

fn category_list(categories: &[Category]) -> String {
    categories
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::InvalidCategory { allowed, .. } => write!(
                f,
                "Invalid event category. Must be one of: {}",
                category_list(allowed)
            ),
            ErrorKind::WildcardPublish => write!(
                f,
                "Cannot publish events of category \"all\". Must be one of: {}",
                category_list(&Category::PUBLISHABLE)
            ),
            ErrorKind::MissingSessionId => write!(
                f,
                "Missing session id. Provide an x-session-id header or a sessionId query parameter."
            ),
            ErrorKind::StreamConflict => write!(
                f,
                "Event stream for this session has already been consumed."
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
