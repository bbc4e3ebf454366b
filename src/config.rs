// Configuration for season-scout
// Loads the TOML configuration file and applies environment and command line overrides

use crate::assembler::{Accumulation, DEFAULT_MAX_SEASONS};
use crate::cache::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER};
use crate::coercion::DEFAULT_MISSING_MARKER;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable overriding the API key from the configuration file
pub const API_KEY_ENV: &str = "OMDB_API_KEY";

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema
    #[error("Invalid config file {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Which transport to reach the catalog with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The catalog's JSON API
    #[default]
    Omdb,
    /// The catalog's website
    Scrape,
}

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog access
    pub api: ApiConfig,

    /// Response interpretation and season assembly
    pub parsing: ParsingConfig,

    /// On-disk response cache
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// OMDb API key (required for the omdb source)
    pub api_key: Option<String>,

    /// OMDb endpoint (default: https://www.omdbapi.com/)
    pub base_url: String,

    /// Website root used by the scrape source (default: https://www.imdb.com/)
    pub site_url: String,

    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Transport to use (default: omdb)
    pub source: Source,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::transport::OMDB_BASE_URL.to_string(),
            site_url: crate::transport::SITE_URL.to_string(),
            timeout_secs: crate::transport::DEFAULT_TIMEOUT.as_secs(),
            source: Source::default(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Literal the source uses for "not applicable" (default: "N/A")
    pub missing_marker: String,

    /// Safety limit on season requests per series (default: 100)
    pub max_seasons: u32,

    /// How series positions advance between seasons (default: max-number)
    pub accumulation: Accumulation,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            missing_marker: DEFAULT_MISSING_MARKER.to_string(),
            max_seasons: DEFAULT_MAX_SEASONS,
            accumulation: Accumulation::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache successful responses on disk (default: true)
    pub enabled: bool,

    /// Hours before a cached response is fetched again (default: 24, 0 keeps forever)
    pub ttl_hours: u64,

    /// Override the platform cache directory
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24,
            directory: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_hours > 0).then(|| Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60)))
    }
}

impl Config {
    /// Loads the configuration from `path`, or from the default location
    ///
    /// A missing file yields the defaults. The API key environment variable
    /// is applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Reads and parses one configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// The platform configuration file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Applies environment overrides through a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty()) {
            self.api.api_key = Some(key.trim().to_string());
        }
    }
}
