use crate::error::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Closed set of event categories recognized by the hub.
///
/// `all` is the wildcard: subscribers on it receive every published event, but
/// nothing may be published under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    BotError,
    Update,
    Request,
    All,
}

impl Category {
    /// Every category accepted on the subscribe side.
    pub const VALUES: [Category; 4] = [
        Category::BotError,
        Category::Update,
        Category::Request,
        Category::All,
    ];

    /// Categories accepted on the publish side (the wildcard excluded).
    pub const PUBLISHABLE: [Category; 3] = [Category::BotError, Category::Update, Category::Request];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BotError => "botError",
            Category::Update => "update",
            Category::Request => "request",
            Category::All => "all",
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Category::All)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CategoryParseError;

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "botError" => Ok(Category::BotError),
            "update" => Ok(Category::Update),
            "request" => Ok(Category::Request),
            "all" => Ok(Category::All),
            _ => Err(CategoryParseError),
        }
    }
}

/// Parse a category supplied on a broadcast route, where the wildcard is a
/// legal subscription target.
pub fn broadcast_category(value: &str) -> Result<Category, Error> {
    value
        .parse()
        .map_err(|_| Error::invalid_category(value, &Category::VALUES))
}

/// Parse a category supplied on a session route. Session streams are keyed by
/// session id rather than category, so the wildcard has no meaning there and
/// is rejected along with unknown values.
pub fn session_category(value: &str) -> Result<Category, Error> {
    match value.parse::<Category>() {
        Ok(category) if !category.is_wildcard() => Ok(category),
        _ => Err(Error::invalid_category(value, &Category::PUBLISHABLE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::VALUES {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn test_unknown_category_fails_to_parse() {
        assert_eq!("bogus".parse::<Category>(), Err(CategoryParseError));
        assert_eq!("BotError".parse::<Category>(), Err(CategoryParseError));
    }

    #[test]
    fn test_broadcast_category_accepts_wildcard() {
        assert_eq!(broadcast_category("all").ok(), Some(Category::All));
    }

    #[test]
    fn test_broadcast_category_rejects_unknown_value() {
        let error = broadcast_category("nope").unwrap_err();
        match error.error_kind {
            ErrorKind::InvalidCategory { ref supplied, allowed } => {
                assert_eq!(supplied, "nope");
                assert_eq!(allowed, &Category::VALUES);
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert_eq!(
            error.to_string(),
            "Invalid event category. Must be one of: botError, update, request, all"
        );
    }

    #[test]
    fn test_session_category_rejects_wildcard() {
        let error = session_category("all").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid event category. Must be one of: botError, update, request"
        );
    }

    #[test]
    fn test_session_category_accepts_concrete_values() {
        for category in Category::PUBLISHABLE {
            assert_eq!(session_category(category.as_str()).ok(), Some(category));
        }
    }

    #[test]
    fn test_wildcard_flag() {
        assert!(Category::All.is_wildcard());
        assert!(!Category::Update.is_wildcard());
    }

    #[test]
    fn test_serializes_to_camel_case() {
        let json = serde_json::to_string(&Category::BotError).unwrap();
        assert_eq!(json, "\"botError\"");
    }
}
