//! Cached transport implementation
//!
//! This module provides a caching wrapper for transports that stores
//! successful raw responses on disk and serves them on later requests.

use super::{CatalogQuery, Transport, TransportError};
use crate::cache::CacheStorage;
use crate::response::{MediaKind, RawResponse, is_success};

/// A caching wrapper for transports
///
/// Only successful responses are stored, so a title or season that appears
/// upstream later is not hidden by a cached "not found". Cache failures are
/// logged and never fail a request.
pub struct CachedTransport<T>
where
    T: Transport,
{
    /// The underlying transport
    transport: T,
    /// Cache storage for raw responses
    cache: CacheStorage<RawResponse>,
}

impl<T> CachedTransport<T>
where
    T: Transport,
{
    /// Creates a new cached transport wrapping the given transport
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let omdb = OmdbTransport::new(api_key)?;
    /// let dir = CacheStorage::<RawResponse>::default_dir("omdb")?;
    /// let cache = CacheStorage::open_at(&dir, Some(Duration::from_secs(86400)))?;
    /// let cached = CachedTransport::new(omdb, cache);
    /// ```
    pub fn new(transport: T, cache: CacheStorage<RawResponse>) -> Self {
        Self { transport, cache }
    }

    /// Returns the wrapped transport
    pub fn inner(&self) -> &T {
        &self.transport
    }

    /// Derives a fixed-length cache key from the request description
    fn cache_key(request: &str) -> String {
        blake3::hash(request.as_bytes()).to_hex().to_string()
    }

    fn cached(
        &self,
        request: String,
        fetch: impl FnOnce(&T) -> Result<RawResponse, TransportError>,
    ) -> Result<RawResponse, TransportError> {
        let key = Self::cache_key(&request);

        match self.cache.load(&key) {
            Ok(Some(response)) => {
                tracing::debug!(%request, "cache hit");
                return Ok(response);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%request, error = %e, "ignoring unreadable cache entry");
            }
        }

        let response = fetch(&self.transport)?;

        if is_success(&response) {
            if let Err(e) = self.cache.store(&key, &response) {
                tracing::warn!(%request, error = %e, "failed to store response in cache");
            }
        }

        Ok(response)
    }
}

impl<T> Transport for CachedTransport<T>
where
    T: Transport,
{
    fn fetch_media(&self, query: &CatalogQuery) -> Result<RawResponse, TransportError> {
        let request = match query {
            CatalogQuery::Id(id) => format!("media:id:{id}"),
            CatalogQuery::Title(title) => format!("media:title:{}", title.to_lowercase()),
        };
        self.cached(request, |transport| transport.fetch_media(query))
    }

    fn fetch_season_page(&self, series_id: &str, season_index: u32) -> Result<RawResponse, TransportError> {
        self.cached(format!("season:{series_id}:{season_index}"), |transport| {
            transport.fetch_season_page(series_id, season_index)
        })
    }

    fn search(&self, term: &str, kind: Option<MediaKind>) -> Result<RawResponse, TransportError> {
        let kind_label = kind.map(MediaKind::as_str).unwrap_or("any");
        self.cached(
            format!("search:{kind_label}:{}", term.to_lowercase()),
            |transport| transport.search(term, kind),
        )
    }
}
