//! Site-scraping transport implementation.

use super::structured_data::{
    episode_ids, episode_marker, extract_json_ld, season_page, strip_at_prefixes, to_raw_response,
};
use super::{CatalogQuery, Transport, TransportError};
use crate::resources::EpisodeKey;
use crate::response::{RawResponse, failure_response};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

/// Default site root
pub const DEFAULT_SITE_URL: &str = "https://www.imdb.com/";

/// Episode IDs seen on the most recent season page
struct SeasonMemo {
    series_id: String,
    season_index: u32,
    episode_ids: Vec<String>,
}

/// Transport that reads title pages of the catalog's website.
///
/// Title pages embed schema.org data which is mapped onto the API's response
/// shape. Season pages are assembled from the episode list page: every listed
/// episode is fetched and numbered by its position on the page.
///
/// The site answers out-of-range season requests with the last existing
/// season, so a season listing the same episodes as the one before is
/// reported as not found. The previous season is compared even when this
/// transport never fetched it (e.g. because a cache answered it).
pub struct ScrapedTransport {
    client: reqwest::blocking::Client,
    site_url: String,
    last_season: RefCell<Option<SeasonMemo>>,
    /// Position of every episode seen on a season page
    listed: RefCell<HashMap<String, EpisodeKey>>,
}

impl ScrapedTransport {
    /// Creates a transport for the public site with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_settings(DEFAULT_SITE_URL, super::omdb::DEFAULT_TIMEOUT)
    }

    /// Creates a transport for a custom site root and timeout.
    pub fn with_settings(site_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        let mut site_url = site_url.into();
        if !site_url.ends_with('/') {
            site_url.push('/');
        }

        Ok(Self {
            client,
            site_url,
            last_season: RefCell::new(None),
            listed: RefCell::new(HashMap::new()),
        })
    }

    /// Fetches a page; `None` if the site doesn't know it
    fn get_page(&self, url: &str, query: &[(&str, String)]) -> Result<Option<String>, TransportError> {
        tracing::debug!(url, query = ?query, "fetching page");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .text()
            .map(Some)
            .map_err(|e| TransportError::ParseError(e.to_string()))
    }

    /// Fetches a title page and maps its structured data
    fn fetch_title(&self, imdb_id: &str) -> Result<RawResponse, TransportError> {
        let url = format!("{}title/{}/", self.site_url, imdb_id);
        let Some(html) = self.get_page(&url, &[])? else {
            return Ok(failure_response("Incorrect IMDb ID."));
        };

        let mut raw = match strip_at_prefixes(extract_json_ld(&html)?) {
            Value::Object(data) => to_raw_response(&data, imdb_id),
            _ => {
                return Err(TransportError::ParseError(
                    "structured data is not an object".to_string(),
                ));
            }
        };
        self.number_episode(&mut raw, &html, imdb_id);
        Ok(raw)
    }

    /// Adds `Season`/`Episode` to an episode page's response
    ///
    /// The structured data has no numbering; it comes from the page's own
    /// `S1.E3` marker, or else from the season page that listed the episode.
    /// An episode found in neither keeps its gap.
    fn number_episode(&self, raw: &mut RawResponse, html: &str, imdb_id: &str) {
        if raw.get("Type").and_then(Value::as_str) != Some("episode") {
            return;
        }

        let Some(key) = episode_marker(html).or_else(|| self.listed.borrow().get(imdb_id).copied()) else {
            tracing::debug!(imdb_id, "episode page carries no season or episode number");
            return;
        };
        raw.entry("Season")
            .or_insert_with(|| Value::from(key.season.to_string()));
        raw.entry("Episode")
            .or_insert_with(|| Value::from(key.episode.to_string()));
    }

    /// Episode IDs listed for one season; `None` if the site doesn't know the series
    fn season_listing(&self, series_id: &str, season_index: u32) -> Result<Option<Vec<String>>, TransportError> {
        let url = format!("{}title/{}/episodes", self.site_url, series_id);
        Ok(self
            .get_page(&url, &[("season", season_index.to_string())])?
            .map(|html| episode_ids(&html, series_id)))
    }

    /// Episode IDs of the season right before `season_index`
    ///
    /// Served from the memo when this transport fetched that season itself,
    /// otherwise read from the site.
    fn previous_season(&self, series_id: &str, season_index: u32) -> Result<Option<Vec<String>>, TransportError> {
        if season_index <= 1 {
            return Ok(None);
        }
        let previous = season_index - 1;

        if let Some(memo) = self.last_season.borrow().as_ref() {
            if memo.series_id == series_id && memo.season_index == previous {
                return Ok(Some(memo.episode_ids.clone()));
            }
        }

        tracing::debug!(series_id, season_index = previous, "listing previous season for comparison");
        self.season_listing(series_id, previous)
    }
}

/// Turns a fetched episode page into a season page entry
fn season_entry(episode: &RawResponse, imdb_id: &str, position: usize) -> RawResponse {
    let mut entry = RawResponse::new();
    entry.insert("Episode".to_string(), Value::from(position.to_string()));
    entry.insert("imdbID".to_string(), Value::from(imdb_id));
    for field in ["Title", "imdbRating", "Released"] {
        if let Some(value) = episode.get(field) {
            entry.insert(field.to_string(), value.clone());
        }
    }
    entry
}

impl Transport for ScrapedTransport {
    fn fetch_media(&self, query: &CatalogQuery) -> Result<RawResponse, TransportError> {
        match query {
            CatalogQuery::Id(id) => self.fetch_title(id),
            CatalogQuery::Title(_) => Err(TransportError::Unsupported("title lookup")),
        }
    }

    fn fetch_season_page(&self, series_id: &str, season_index: u32) -> Result<RawResponse, TransportError> {
        let ids = match self.season_listing(series_id, season_index)? {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Ok(season_page(season_index, Vec::new())),
        };

        if self
            .previous_season(series_id, season_index)?
            .is_some_and(|previous| previous == ids)
        {
            tracing::debug!(series_id, season_index, "season page repeats the previous season");
            return Ok(season_page(season_index, Vec::new()));
        }

        let mut entries = Vec::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            let number = u32::try_from(position + 1).unwrap_or(u32::MAX);
            self.listed
                .borrow_mut()
                .insert(id.clone(), EpisodeKey::new(season_index, number));

            let episode = self.fetch_title(id)?;
            entries.push(season_entry(&episode, id, position + 1));
        }

        *self.last_season.borrow_mut() = Some(SeasonMemo {
            series_id: series_id.to_string(),
            season_index,
            episode_ids: ids,
        });

        Ok(season_page(season_index, entries))
    }
}
