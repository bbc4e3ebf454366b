//! In-memory transport for tests (also exported with the `testing` feature)
//!
//! Responses are registered up front; every request is recorded so that callers
//! can check exactly what was asked for and in which order.

use super::{CatalogQuery, Transport, TransportError};
use crate::response::{MediaKind, RawResponse, failure_response};
use std::cell::RefCell;
use std::collections::HashMap;

/// A request observed by a [`FixtureTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureRequest {
    Media(CatalogQuery),
    SeasonPage { series_id: String, season_index: u32 },
    Search { term: String, kind: Option<MediaKind> },
}

/// A transport that answers from registered fixtures
///
/// Requests without a registered response get a failure-shaped response, the
/// same way the catalog answers for a title or season that doesn't exist.
#[derive(Debug, Default)]
pub struct FixtureTransport {
    media: HashMap<CatalogQuery, RawResponse>,
    seasons: HashMap<(String, u32), RawResponse>,
    season_errors: HashMap<(String, u32), String>,
    searches: HashMap<String, RawResponse>,
    requests: RefCell<Vec<FixtureRequest>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response for a media lookup
    pub fn with_media(mut self, query: CatalogQuery, response: RawResponse) -> Self {
        self.media.insert(query, response);
        self
    }

    /// Registers the response for one season page
    pub fn with_season(mut self, series_id: &str, season_index: u32, response: RawResponse) -> Self {
        self.seasons.insert((series_id.to_string(), season_index), response);
        self
    }

    /// Makes one season page request fail at the transport level
    pub fn with_season_error(mut self, series_id: &str, season_index: u32, message: &str) -> Self {
        self.season_errors
            .insert((series_id.to_string(), season_index), message.to_string());
        self
    }

    /// Registers the response for a search term
    pub fn with_search(mut self, term: &str, response: RawResponse) -> Self {
        self.searches.insert(term.to_string(), response);
        self
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<FixtureRequest> {
        self.requests.borrow().clone()
    }

    /// The season indices requested so far, in order
    pub fn requested_seasons(&self) -> Vec<u32> {
        self.requests
            .borrow()
            .iter()
            .filter_map(|request| match request {
                FixtureRequest::SeasonPage { season_index, .. } => Some(*season_index),
                _ => None,
            })
            .collect()
    }

    fn record(&self, request: FixtureRequest) {
        self.requests.borrow_mut().push(request);
    }
}

impl Transport for FixtureTransport {
    fn fetch_media(&self, query: &CatalogQuery) -> Result<RawResponse, TransportError> {
        self.record(FixtureRequest::Media(query.clone()));
        Ok(self
            .media
            .get(query)
            .cloned()
            .unwrap_or_else(|| failure_response("Incorrect IMDb ID.")))
    }

    fn fetch_season_page(&self, series_id: &str, season_index: u32) -> Result<RawResponse, TransportError> {
        self.record(FixtureRequest::SeasonPage {
            series_id: series_id.to_string(),
            season_index,
        });

        let key = (series_id.to_string(), season_index);
        if let Some(message) = self.season_errors.get(&key) {
            return Err(TransportError::RequestError(message.clone()));
        }
        Ok(self
            .seasons
            .get(&key)
            .cloned()
            .unwrap_or_else(|| failure_response("Series or season not found!")))
    }

    fn search(&self, term: &str, kind: Option<MediaKind>) -> Result<RawResponse, TransportError> {
        self.record(FixtureRequest::Search {
            term: term.to_string(),
            kind,
        });
        Ok(self
            .searches
            .get(term)
            .cloned()
            .unwrap_or_else(|| failure_response("Movie not found!")))
    }
}
