//! season-scout - Media metadata retrieval and season assembly
//!
//! This library looks up movies, series and episodes in an online catalog,
//! normalizes the catalog's loosely typed responses into typed resources, and
//! reassembles a series' season pages into one ordered episode list that can
//! be projected into a table or used to rename episode files.

mod assembler;
mod builder;
mod cache;
mod catalog;
mod coercion;
mod config;
mod renamer;
mod resources;
mod response;
mod table;
mod transport;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use assembler::{Accumulation, AssemblyError, DEFAULT_MAX_SEASONS, SeasonAssembler};
pub use builder::{BuildError, ResourceBuilder, SearchCandidate, SearchResults};
pub use cache::{CacheError, CacheStorage};
pub use catalog::{Catalog, CatalogError};
pub use coercion::{
    DEFAULT_MISSING_MARKER, LetterCase, Number, Runtime, YearSpan, parse_currency, parse_date,
    parse_duration, parse_list, parse_list_with, parse_number, parse_year_span,
};
pub use config::{API_KEY_ENV, ApiConfig, CacheConfig, Config, ConfigError, ParsingConfig, Source};
pub use renamer::{
    DEFAULT_FORMAT, DEFAULT_PATTERN, EpisodePattern, PlannedRename, RenameAction, RenameError,
    RenameFailure, RenameReport, execute_renames, format_filename, list_files, plan_renames,
    sanitize_filename, write_rename_log,
};
pub use resources::{
    EpisodeKey, EpisodeResource, FilmResource, MediaDetails, MediaResource, MiniEpisode,
    ParseEpisodeKeyError, Rating, SeasonView, SeriesResource, SeriesSummary, episode_label,
    format_rating,
};
pub use response::{
    Classification, MediaKind, RawResponse, ResponseKind, classify, failure_response, is_success,
};
pub use table::{SeriesRow, SeriesTable, TSV_COLUMNS, mean_rating};
pub use transport::{
    CachedTransport, CatalogQuery, OmdbTransport, ScrapedTransport, Transport, TransportError,
    is_catalog_id,
};
/// In-memory transport for exercising catalog code without the network
#[cfg(any(test, feature = "testing"))]
pub use transport::{FixtureRequest, FixtureTransport};

/// Progress event emitted while resolving and assembling a series
///
/// These events allow library users to track progress and provide feedback
/// during the many requests a long-running series needs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Looking up the requested title
    FetchingMedia { query: String },

    /// The title was found
    MediaResolved {
        imdb_id: String,
        title: String,
        kind: MediaKind,
    },

    /// Requesting one season page
    FetchingSeason { series_id: String, season_index: u32 },

    /// A season page contributed episodes
    SeasonAssembled {
        season_index: u32,
        episode_count: usize,
    },

    /// Requesting the full details of one episode
    FetchingEpisode {
        episode_id: String,
        index: usize,
        total: usize,
    },

    /// Season assembly finished
    AssemblyComplete {
        season_count: u32,
        episode_count: usize,
    },
}

/// Top-level error type for season-scout operations
#[derive(Debug, Error)]
pub enum SeasonScoutError {
    /// Error while using the catalog
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error while setting up a transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error while loading the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error during cache operations
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error while renaming files
    #[error("Rename error: {0}")]
    Rename(#[from] RenameError),

    /// The API transport was selected without an API key
    #[error("No API key configured (set OMDB_API_KEY, api.api_key or --api-key)")]
    MissingApiKey,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Opens the catalog described by a configuration
///
/// Selects the transport, wraps it in the response cache when enabled, and
/// applies the parsing settings. A cache that cannot be opened is skipped
/// with a warning.
///
/// # Examples
///
/// ```no_run
/// use season_scout::{CatalogQuery, Config, ProgressEvent, open_catalog};
///
/// let config = Config::load(None).unwrap();
/// let catalog = open_catalog(&config).unwrap();
///
/// let series = catalog
///     .series_with_episodes(&CatalogQuery::parse("tt7569592"), |event| {
///         if let ProgressEvent::SeasonAssembled { season_index, episode_count } = event {
///             println!("Season {season_index}: {episode_count} episodes");
///         }
///     })
///     .unwrap();
/// ```
pub fn open_catalog(config: &Config) -> Result<Catalog<Box<dyn Transport>>, SeasonScoutError> {
    let (transport, cache_name): (Box<dyn Transport>, &str) = match config.api.source {
        Source::Omdb => {
            let api_key = config
                .api
                .api_key
                .clone()
                .ok_or(SeasonScoutError::MissingApiKey)?;
            let transport: Box<dyn Transport> = Box::new(OmdbTransport::with_settings(
                api_key,
                &config.api.base_url,
                config.api.timeout(),
            )?);
            (transport, OMDB_CACHE)
        }
        Source::Scrape => {
            let transport: Box<dyn Transport> = Box::new(ScrapedTransport::with_settings(
                &config.api.site_url,
                config.api.timeout(),
            )?);
            (transport, SCRAPE_CACHE)
        }
    };

    let transport = if config.cache.enabled {
        with_cache(transport, cache_name, &config.cache)
    } else {
        transport
    };

    Ok(Catalog::new(transport)
        .with_missing_marker(config.parsing.missing_marker.clone())
        .with_max_seasons(config.parsing.max_seasons)
        .with_accumulation(config.parsing.accumulation))
}

const OMDB_CACHE: &str = "omdb";
const SCRAPE_CACHE: &str = "scrape";

fn cache_dir(config: &CacheConfig, name: &str) -> Result<PathBuf, CacheError> {
    match &config.directory {
        Some(directory) => Ok(directory.join(name)),
        None => CacheStorage::<RawResponse>::default_dir(name),
    }
}

fn with_cache(transport: Box<dyn Transport>, name: &str, config: &CacheConfig) -> Box<dyn Transport> {
    let storage = cache_dir(config, name).and_then(|dir| CacheStorage::open_at(&dir, config.ttl()));

    match storage {
        Ok(storage) => {
            tracing::debug!(cache_dir = %storage.cache_dir().display(), "response cache enabled");
            Box::new(CachedTransport::new(transport, storage))
        }
        Err(e) => {
            tracing::warn!(error = %e, "response cache unavailable, continuing without it");
            transport
        }
    }
}

/// Deletes the cached responses of every source, returning the number removed
pub fn clear_cache(config: &CacheConfig) -> Result<usize, SeasonScoutError> {
    let mut removed = 0;
    for name in [OMDB_CACHE, SCRAPE_CACHE] {
        let dir = cache_dir(config, name)?;
        if dir.is_dir() {
            removed += CacheStorage::<RawResponse>::open_at(&dir, None)?.clear()?;
        }
    }
    Ok(removed)
}

/// Default location of the rename log inside a renamed directory
pub fn rename_log_path(directory: &std::path::Path) -> PathBuf {
    directory.join("season-scout-renames.log")
}
