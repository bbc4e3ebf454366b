//! Catalog facade
//!
//! Combines a transport with the builder and the season assembler. This is the
//! entry point for looking up titles, assembling series and producing tables.

use crate::ProgressEvent;
use crate::assembler::{Accumulation, AssemblyError, DEFAULT_MAX_SEASONS, SeasonAssembler};
use crate::builder::{BuildError, ResourceBuilder, SearchResults};
use crate::resources::{EpisodeResource, MediaResource, MiniEpisode, SeriesResource};
use crate::response::{Classification, MediaKind, RawResponse, classify};
use crate::table::SeriesTable;
use crate::transport::{CatalogQuery, Transport, TransportError, is_catalog_id};
use thiserror::Error;

/// Errors that can occur while using a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The request could not be completed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response could not be turned into a resource
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Season or episode assembly failed
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// A series was required but the title is something else
    #[error("{imdb_id} is a {kind}, not a series")]
    NotASeries { imdb_id: String, kind: MediaKind },
}

/// A catalog reachable through a transport
///
/// Upstream "no match" answers are returned as `Ok(None)`; errors are reserved
/// for failed requests and malformed data.
pub struct Catalog<T: Transport> {
    transport: T,
    builder: ResourceBuilder,
    max_seasons: u32,
    accumulation: Accumulation,
}

impl<T: Transport> Catalog<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            builder: ResourceBuilder::default(),
            max_seasons: DEFAULT_MAX_SEASONS,
            accumulation: Accumulation::default(),
        }
    }

    /// Sets the literal the source uses for "not applicable"
    pub fn with_missing_marker(mut self, missing_marker: impl Into<String>) -> Self {
        self.builder = ResourceBuilder::new(missing_marker);
        self
    }

    pub fn with_max_seasons(mut self, max_seasons: u32) -> Self {
        self.max_seasons = max_seasons;
        self
    }

    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn builder(&self) -> &ResourceBuilder {
        &self.builder
    }

    fn assembler(&self) -> SeasonAssembler<'_, T> {
        SeasonAssembler::new(&self.transport, &self.builder)
            .with_max_seasons(self.max_seasons)
            .with_accumulation(self.accumulation)
    }

    /// Looks up a single title; a series comes back without episodes
    pub fn get(&self, query: &CatalogQuery) -> Result<Option<MediaResource>, CatalogError> {
        tracing::debug!(%query, "looking up title");
        let raw = self.transport.fetch_media(query)?;
        self.build_found(&raw)
    }

    /// Looks up a series and assembles all of its seasons
    ///
    /// The episode list is attached once, after every season has been
    /// assembled.
    pub fn series_with_episodes<F>(
        &self,
        query: &CatalogQuery,
        mut progress: F,
    ) -> Result<Option<SeriesResource>, CatalogError>
    where
        F: FnMut(ProgressEvent),
    {
        progress(ProgressEvent::FetchingMedia {
            query: query.as_str().to_string(),
        });

        let Some(resource) = self.get(query)? else {
            return Ok(None);
        };
        progress(ProgressEvent::MediaResolved {
            imdb_id: resource.imdb_id().to_string(),
            title: resource.title().to_string(),
            kind: resource.kind(),
        });

        let mut series = self.require_series(resource)?;
        let episodes = self
            .assembler()
            .assemble_with_progress(&series.details.imdb_id, &mut progress)?;
        series.episodes = episodes;
        Ok(Some(series))
    }

    /// Assembles the mini-episodes of a series by identifier
    pub fn episodes(&self, series_id: &str) -> Result<Vec<MiniEpisode>, CatalogError> {
        Ok(self.assembler().assemble(series_id)?)
    }

    /// Assembles the series and fetches the full resource of every episode
    pub fn full_episodes<F>(&self, series_id: &str, progress: F) -> Result<Vec<EpisodeResource>, CatalogError>
    where
        F: FnMut(ProgressEvent),
    {
        Ok(self.assembler().assemble_full(series_id, progress)?)
    }

    /// Searches the catalog; `None` when nothing matches
    pub fn search(&self, term: &str, kind: Option<MediaKind>) -> Result<Option<SearchResults>, CatalogError> {
        tracing::debug!(term, ?kind, "searching catalog");
        let raw = self.transport.search(term, kind)?;
        if let Classification::Failure { message } = classify(&raw) {
            tracing::debug!(term, ?message, "search found nothing");
            return Ok(None);
        }
        Ok(Some(self.builder.build_search_results(&raw)?))
    }

    /// Resolves a catalog identifier directly, anything else through a
    /// search whose first candidate is fetched
    pub fn find(&self, term: &str, kind: Option<MediaKind>) -> Result<Option<MediaResource>, CatalogError> {
        let term = term.trim();
        if is_catalog_id(term) {
            return self.get(&CatalogQuery::Id(term.to_string()));
        }

        let Some(results) = self.search(term, kind)? else {
            return Ok(None);
        };
        match results.candidates.first() {
            Some(candidate) => self.get(&CatalogQuery::Id(candidate.imdb_id.clone())),
            None => Ok(None),
        }
    }

    /// Looks up and assembles a series and projects it into a table
    pub fn series_table(&self, query: &CatalogQuery) -> Result<Option<SeriesTable>, CatalogError> {
        Ok(self
            .series_with_episodes(query, |_| {})?
            .map(|series| SeriesTable::from_series(&series)))
    }

    fn build_found(&self, raw: &RawResponse) -> Result<Option<MediaResource>, CatalogError> {
        if let Classification::Failure { message } = classify(raw) {
            tracing::debug!(?message, "catalog has no match");
            return Ok(None);
        }
        Ok(Some(self.builder.build(raw)?))
    }

    fn require_series(&self, resource: MediaResource) -> Result<SeriesResource, CatalogError> {
        let kind = resource.kind();
        let imdb_id = resource.imdb_id().to_string();
        resource
            .into_series()
            .ok_or(CatalogError::NotASeries { imdb_id, kind })
    }
}
