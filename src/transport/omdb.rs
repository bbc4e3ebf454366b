/// OMDb API transport implementation.
use super::{CatalogQuery, Transport, TransportError};
use crate::response::{MediaKind, RawResponse};
use std::time::Duration;

/// Default endpoint of the OMDb API
pub const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com/";
/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport for the OMDb API.
///
/// Every request is a GET against a single endpoint; the kind of lookup is
/// selected by query parameters (`i`, `t`, `Season`, `s`). The API key is
/// injected at construction and appended to every request.
pub struct OmdbTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OmdbTransport {
    /// Creates a transport for the public endpoint with the default timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_settings(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Creates a transport for a custom endpoint and timeout.
    pub fn with_settings(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Sends one request and returns the raw JSON object.
    ///
    /// The catalog reports "no match" inside a 200 response, so only
    /// connection problems, HTTP errors and non-object bodies are errors.
    fn request(&self, parameters: &[(&str, String)]) -> Result<RawResponse, TransportError> {
        tracing::debug!(
            endpoint = %self.base_url,
            parameters = ?parameters,
            "sending catalog request"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(parameters)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .json::<RawResponse>()
            .map_err(|e| TransportError::ParseError(e.to_string()))
    }
}

/// Query parameters for a single-title lookup
fn media_parameters(query: &CatalogQuery) -> Vec<(&'static str, String)> {
    match query {
        CatalogQuery::Id(id) => vec![("i", id.clone())],
        CatalogQuery::Title(title) => vec![("t", title.clone())],
    }
}

/// Query parameters for one season page of a series
fn season_parameters(series_id: &str, season_index: u32) -> Vec<(&'static str, String)> {
    vec![("i", series_id.to_string()), ("Season", season_index.to_string())]
}

/// Query parameters for a search; no kind searches every kind
fn search_parameters(term: &str, kind: Option<MediaKind>) -> Vec<(&'static str, String)> {
    let mut parameters = vec![("s", term.to_string())];
    if let Some(kind) = kind {
        parameters.push(("type", kind.as_str().to_string()));
    }
    parameters
}

impl Transport for OmdbTransport {
    fn fetch_media(&self, query: &CatalogQuery) -> Result<RawResponse, TransportError> {
        self.request(&media_parameters(query))
    }

    fn fetch_season_page(&self, series_id: &str, season_index: u32) -> Result<RawResponse, TransportError> {
        self.request(&season_parameters(series_id, season_index))
    }

    fn search(&self, term: &str, kind: Option<MediaKind>) -> Result<RawResponse, TransportError> {
        self.request(&search_parameters(term, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_parameters_select_lookup_key() {
        assert_eq!(
            media_parameters(&CatalogQuery::parse("tt0325980")),
            vec![("i", "tt0325980".to_string())]
        );
        assert_eq!(
            media_parameters(&CatalogQuery::parse("Legion")),
            vec![("t", "Legion".to_string())]
        );
    }

    #[test]
    fn test_season_parameters() {
        assert_eq!(
            season_parameters("tt7569592", 2),
            vec![("i", "tt7569592".to_string()), ("Season", "2".to_string())]
        );
    }

    #[test]
    fn test_search_parameters() {
        assert_eq!(search_parameters("Legion", None), vec![("s", "Legion".to_string())]);
        assert_eq!(
            search_parameters("Legion", Some(MediaKind::Series)),
            vec![("s", "Legion".to_string()), ("type", "series".to_string())]
        );
    }

    #[test]
    fn test_new_builds_client() {
        let transport = OmdbTransport::new("key").unwrap();
        assert_eq!(transport.base_url, DEFAULT_BASE_URL);
        assert_eq!(transport.api_key, "key");
    }
}
