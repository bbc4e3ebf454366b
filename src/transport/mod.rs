//! Transports that deliver raw catalog responses.
//!
//! A transport knows how to reach a catalog and returns the raw, string-typed
//! response maps described in [`crate::response`]. It never interprets them
//! beyond what is needed to resolve a request.

mod cached;
#[cfg(any(test, feature = "testing"))]
mod fixture;
mod omdb;
mod scraped;
mod structured_data;

pub use cached::CachedTransport;
#[cfg(any(test, feature = "testing"))]
pub use fixture::{FixtureRequest, FixtureTransport};
pub use omdb::{DEFAULT_BASE_URL as OMDB_BASE_URL, DEFAULT_TIMEOUT, OmdbTransport};
pub use scraped::{DEFAULT_SITE_URL as SITE_URL, ScrapedTransport};

use crate::response::{MediaKind, RawResponse};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static RE_CATALOG_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}\d{7,8}$").unwrap());

/// Errors that can occur while talking to a catalog
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request to the catalog failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// The catalog answered with a non-success HTTP status
    #[error("HTTP {status} {reason}")]
    Http { status: u16, reason: String },

    /// Failed to parse the catalog's response body
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The transport cannot serve this kind of request
    #[error("Operation not supported by this transport: {0}")]
    Unsupported(&'static str),
}

/// What to look up: a catalog identifier or a free-text title
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogQuery {
    Id(String),
    Title(String),
}

impl CatalogQuery {
    /// Interprets user input, recognizing catalog identifiers by their shape
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if is_catalog_id(text) {
            CatalogQuery::Id(text.to_string())
        } else {
            CatalogQuery::Title(text.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CatalogQuery::Id(value) | CatalogQuery::Title(value) => value,
        }
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogQuery::Id(id) => write!(f, "id {id}"),
            CatalogQuery::Title(title) => write!(f, "title \"{title}\""),
        }
    }
}

/// Returns true if the text has the shape of a catalog identifier (e.g. `tt0325980`)
pub fn is_catalog_id(text: &str) -> bool {
    RE_CATALOG_ID.is_match(text)
}

/// Trait for anything that can fetch raw catalog responses.
///
/// An upstream "no match" is not an error: it comes back as a failure-shaped
/// response and is classified by the caller. Errors are reserved for requests
/// that could not be completed at all.
pub trait Transport {
    /// Fetches a single title by identifier or by title text
    fn fetch_media(&self, query: &CatalogQuery) -> Result<RawResponse, TransportError>;

    /// Fetches the episode listing of one season of a series
    fn fetch_season_page(&self, series_id: &str, season_index: u32) -> Result<RawResponse, TransportError>;

    /// Searches the catalog for titles matching a term
    fn search(&self, _term: &str, _kind: Option<MediaKind>) -> Result<RawResponse, TransportError> {
        Err(TransportError::Unsupported("search"))
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn fetch_media(&self, query: &CatalogQuery) -> Result<RawResponse, TransportError> {
        (**self).fetch_media(query)
    }

    fn fetch_season_page(&self, series_id: &str, season_index: u32) -> Result<RawResponse, TransportError> {
        (**self).fetch_season_page(series_id, season_index)
    }

    fn search(&self, term: &str, kind: Option<MediaKind>) -> Result<RawResponse, TransportError> {
        (**self).search(term, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_query_parse() {
        assert_eq!(
            CatalogQuery::parse("tt0325980"),
            CatalogQuery::Id("tt0325980".to_string())
        );
        assert_eq!(
            CatalogQuery::parse("  tt10048342 "),
            CatalogQuery::Id("tt10048342".to_string())
        );
        assert_eq!(
            CatalogQuery::parse("Legion"),
            CatalogQuery::Title("Legion".to_string())
        );
        // Too short, too long, or digits in the prefix
        assert!(matches!(CatalogQuery::parse("tt123456"), CatalogQuery::Title(_)));
        assert!(matches!(CatalogQuery::parse("tt123456789"), CatalogQuery::Title(_)));
        assert!(matches!(CatalogQuery::parse("t10325980"), CatalogQuery::Title(_)));
    }

    #[test]
    fn test_catalog_query_display() {
        assert_eq!(CatalogQuery::parse("tt0325980").to_string(), "id tt0325980");
        assert_eq!(CatalogQuery::parse("Legion").to_string(), "title \"Legion\"");
    }
}
