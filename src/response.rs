//! Raw catalog responses and their classification
//!
//! The upstream API answers with loosely typed JSON objects. This module decides
//! whether such an object reports success and which kind of payload it carries,
//! without ever panicking or guessing a kind for an unknown shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// A raw response exactly as the transport delivered it
pub type RawResponse = Map<String, Value>;

/// Field carrying the textual success flag
pub const STATUS_FIELD: &str = "Response";
/// Value of [`STATUS_FIELD`] on success
pub const SUCCESS_LITERAL: &str = "True";
/// Value of [`STATUS_FIELD`] on failure
pub const FAILURE_LITERAL: &str = "False";

const ERROR_FIELD: &str = "Error";
const TYPE_FIELD: &str = "Type";
const EPISODES_FIELD: &str = "Episodes";
const SEARCH_FIELD: &str = "Search";

/// Kind of a catalog title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Series,
    Movie,
    Episode,
}

impl MediaKind {
    /// The type tag the catalog uses for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Series => "series",
            MediaKind::Movie => "movie",
            MediaKind::Episode => "episode",
        }
    }

    /// Parses a catalog type tag, ignoring case
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "series" => Some(MediaKind::Series),
            "movie" => Some(MediaKind::Movie),
            "episode" => Some(MediaKind::Episode),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload kind of a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Series,
    Movie,
    Episode,
    /// Episode listing of one season (recognized by its episode list)
    SeasonPage,
    /// Search candidates (recognized by its result list)
    SearchPage,
}

impl From<MediaKind> for ResponseKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Series => ResponseKind::Series,
            MediaKind::Movie => ResponseKind::Movie,
            MediaKind::Episode => ResponseKind::Episode,
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResponseKind::Series => "series",
            ResponseKind::Movie => "movie",
            ResponseKind::Episode => "episode",
            ResponseKind::SeasonPage => "season page",
            ResponseKind::SearchPage => "search page",
        };
        f.write_str(label)
    }
}

/// Outcome of classifying a raw response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The response reports success and has a recognized shape
    Success(ResponseKind),
    /// The catalog answered but reported no match
    Failure { message: Option<String> },
    /// The response has no status or an unrecognized shape
    Unclassifiable,
}

/// Returns true iff the status field equals the success literal
pub fn is_success(raw: &RawResponse) -> bool {
    text(raw, STATUS_FIELD).is_some_and(|status| status.trim().eq_ignore_ascii_case(SUCCESS_LITERAL))
}

/// Classifies a raw response by its status field and shape
pub fn classify(raw: &RawResponse) -> Classification {
    let Some(status) = text(raw, STATUS_FIELD) else {
        return Classification::Unclassifiable;
    };
    let status = status.trim();

    if status.eq_ignore_ascii_case(FAILURE_LITERAL) {
        return Classification::Failure {
            message: text(raw, ERROR_FIELD).map(Cow::into_owned),
        };
    }
    if !status.eq_ignore_ascii_case(SUCCESS_LITERAL) {
        return Classification::Unclassifiable;
    }

    match shape_of(raw) {
        Some(kind) => Classification::Success(kind),
        None => Classification::Unclassifiable,
    }
}

fn shape_of(raw: &RawResponse) -> Option<ResponseKind> {
    // An explicit type tag wins; an unknown tag is not guessed around
    if let Some(tag) = text(raw, TYPE_FIELD) {
        return MediaKind::from_type_tag(&tag).map(ResponseKind::from);
    }
    if raw.get(EPISODES_FIELD).is_some_and(Value::is_array) {
        return Some(ResponseKind::SeasonPage);
    }
    if raw.get(SEARCH_FIELD).is_some_and(Value::is_array) {
        return Some(ResponseKind::SearchPage);
    }
    None
}

/// Builds a failure-shaped response like the ones the catalog sends for "no match"
pub fn failure_response(message: &str) -> RawResponse {
    let mut raw = RawResponse::new();
    raw.insert(STATUS_FIELD.to_string(), Value::from(FAILURE_LITERAL));
    raw.insert(ERROR_FIELD.to_string(), Value::from(message));
    raw
}

/// Reads a scalar field as text; numbers and booleans are rendered
pub(crate) fn text<'a>(raw: &'a RawResponse, key: &str) -> Option<Cow<'a, str>> {
    match raw.get(key)? {
        Value::String(value) => Some(Cow::Borrowed(value.as_str())),
        Value::Number(value) => Some(Cow::Owned(value.to_string())),
        Value::Bool(value) => Some(Cow::Owned(value.to_string())),
        _ => None,
    }
}

/// Reads a scalar field as text, substituting the missing-marker when absent
pub(crate) fn text_or<'a>(raw: &'a RawResponse, key: &str, missing: &'a str) -> Cow<'a, str> {
    text(raw, key).unwrap_or(Cow::Borrowed(missing))
}
