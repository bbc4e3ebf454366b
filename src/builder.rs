//! Conversion of classified raw responses into canonical resources
//!
//! This is the only place that knows the catalog's field names. Every field of
//! the resource model is mapped explicitly; optional fields fall back to the
//! coercion sentinels while identifying fields are required.

use crate::coercion::{
    DEFAULT_MISSING_MARKER, parse_currency, parse_date, parse_duration, parse_list, parse_number,
    parse_year_span,
};
use crate::resources::{
    EpisodeResource, FilmResource, MediaDetails, MediaResource, MiniEpisode, Rating,
    SeriesResource, episode_label,
};
use crate::response::{Classification, MediaKind, RawResponse, ResponseKind, classify, text, text_or};
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur while building a resource from a raw response
#[derive(Debug, Error)]
pub enum BuildError {
    /// The response reports failure and carries no resource
    #[error("Catalog reported failure: {}", .0.as_deref().unwrap_or("no message"))]
    UpstreamFailure(Option<String>),

    /// The response has no recognizable shape
    #[error("Response does not match any known shape")]
    Unclassifiable,

    /// The response is of a different kind than the caller asked for
    #[error("Expected a {expected} response, got a {actual} response")]
    UnexpectedKind {
        expected: &'static str,
        actual: ResponseKind,
    },

    /// A field required for this kind of response is absent
    #[error("{kind} response is missing required field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A required field is present but cannot be interpreted
    #[error("{kind} response has invalid value '{value}' for field '{field}'")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: String,
    },
}

/// One candidate of a search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub title: String,
    pub year: Option<String>,
    pub imdb_id: String,
    /// `None` when the catalog reports a kind this crate doesn't model
    pub kind: Option<MediaKind>,
    pub poster: Option<String>,
}

/// A parsed search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    /// Total number of matches upstream, across all pages
    pub total_results: u64,
    pub candidates: Vec<SearchCandidate>,
}

const SERIES: &str = "series";
const MOVIE: &str = "movie";
const EPISODE: &str = "episode";
const SEASON_PAGE: &str = "season page";
const SEASON_EPISODE: &str = "season episode";
const SEARCH_PAGE: &str = "search page";

/// Builds canonical resources from raw catalog responses
///
/// The builder is configured with the missing-marker of the source it reads
/// from; all coercions use that marker.
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    missing_marker: String,
}

impl Default for ResourceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_MARKER)
    }
}

impl ResourceBuilder {
    pub fn new(missing_marker: impl Into<String>) -> Self {
        Self {
            missing_marker: missing_marker.into(),
        }
    }

    pub fn missing_marker(&self) -> &str {
        &self.missing_marker
    }

    /// Builds the resource for a successful series, movie or episode response
    ///
    /// A series is returned with an empty episode list; seasons are assembled
    /// separately.
    pub fn build(&self, raw: &RawResponse) -> Result<MediaResource, BuildError> {
        match self.expect_success(raw)? {
            ResponseKind::Series => self.build_series(raw).map(MediaResource::Series),
            ResponseKind::Movie => self.build_film(raw).map(MediaResource::Film),
            ResponseKind::Episode => self.build_episode(raw).map(MediaResource::Episode),
            other => Err(BuildError::UnexpectedKind {
                expected: "series, movie or episode",
                actual: other,
            }),
        }
    }

    pub fn build_series(&self, raw: &RawResponse) -> Result<SeriesResource, BuildError> {
        self.expect_kind(raw, ResponseKind::Series, SERIES)?;
        let missing = self.missing_marker();

        Ok(SeriesResource {
            details: self.details(raw, SERIES)?,
            total_seasons: parse_number(&text_or(raw, "totalSeasons", missing), missing)
                .as_u32()
                .unwrap_or(0),
            years: parse_year_span(&text_or(raw, "Year", missing), missing),
            episodes: Vec::new(),
        })
    }

    pub fn build_film(&self, raw: &RawResponse) -> Result<FilmResource, BuildError> {
        self.expect_kind(raw, ResponseKind::Movie, MOVIE)?;
        let missing = self.missing_marker();

        Ok(FilmResource {
            details: self.details(raw, MOVIE)?,
            year: parse_year_span(&text_or(raw, "Year", missing), missing).start,
            box_office: parse_currency(&text_or(raw, "BoxOffice", missing), missing),
            release_date_home: parse_date(&text_or(raw, "DVD", missing), missing),
            production: self.optional(raw, "Production"),
            website: self.optional(raw, "Website"),
        })
    }

    /// Builds a full episode; season and episode numbers are mandatory
    pub fn build_episode(&self, raw: &RawResponse) -> Result<EpisodeResource, BuildError> {
        self.expect_kind(raw, ResponseKind::Episode, EPISODE)?;

        Ok(EpisodeResource {
            details: self.details(raw, EPISODE)?,
            season_index: self.required_index(raw, EPISODE, "Season")?,
            index_in_season: self.required_index(raw, EPISODE, "Episode")?,
            index_in_series: None,
            series_id: self.required(raw, EPISODE, "seriesID")?.into_owned(),
        })
    }

    /// Builds the mini-episodes listed on a season page, in source order
    ///
    /// `previous_episodes` is the number of episodes accounted for by earlier
    /// seasons. A page without an episode list yields an empty season.
    pub fn build_season_page(
        &self,
        raw: &RawResponse,
        season_index: u32,
        previous_episodes: u32,
    ) -> Result<Vec<MiniEpisode>, BuildError> {
        let missing = self.missing_marker();
        if let Some(reported) = parse_number(&text_or(raw, "Season", missing), missing).as_u32() {
            if reported != season_index {
                tracing::warn!(
                    requested = season_index,
                    reported,
                    "season page reports a different season number"
                );
            }
        }

        let Some(entries) = raw.get("Episodes").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        entries
            .iter()
            .map(|entry| {
                let entry = entry.as_object().ok_or_else(|| BuildError::InvalidField {
                    kind: SEASON_PAGE,
                    field: "Episodes",
                    value: entry.to_string(),
                })?;
                self.build_mini_episode(entry, season_index, previous_episodes)
            })
            .collect()
    }

    /// Builds one mini-episode from a season page entry
    ///
    /// The entry's own episode number is used as-is, whatever its position in
    /// the list.
    pub fn build_mini_episode(
        &self,
        entry: &RawResponse,
        season_index: u32,
        previous_episodes: u32,
    ) -> Result<MiniEpisode, BuildError> {
        let missing = self.missing_marker();
        let index_in_season = self.required_index(entry, SEASON_EPISODE, "Episode")?;

        Ok(MiniEpisode {
            title: text_or(entry, "Title", missing).into_owned(),
            imdb_id: self.required(entry, SEASON_EPISODE, "imdbID")?.into_owned(),
            imdb_rating: parse_number(&text_or(entry, "imdbRating", missing), missing).as_f64(),
            release_date: parse_date(&text_or(entry, "Released", missing), missing),
            episode_id: episode_label(season_index, index_in_season),
            season_index,
            index_in_season,
            index_in_series: previous_episodes.saturating_add(index_in_season),
        })
    }

    /// Parses a successful search page
    pub fn build_search_results(&self, raw: &RawResponse) -> Result<SearchResults, BuildError> {
        self.expect_kind(raw, ResponseKind::SearchPage, SEARCH_PAGE)?;
        let missing = self.missing_marker();

        let candidates = raw
            .get("Search")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_object)
            .map(|item| {
                Ok(SearchCandidate {
                    title: self.required(item, SEARCH_PAGE, "Title")?.into_owned(),
                    year: self.optional(item, "Year"),
                    imdb_id: self.required(item, SEARCH_PAGE, "imdbID")?.into_owned(),
                    kind: text(item, "Type").and_then(|tag| MediaKind::from_type_tag(&tag)),
                    poster: self.optional(item, "Poster"),
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let total_results = parse_number(&text_or(raw, "totalResults", missing), missing)
            .as_u64()
            .unwrap_or(candidates.len() as u64);

        Ok(SearchResults {
            total_results,
            candidates,
        })
    }

    fn details(&self, raw: &RawResponse, kind: &'static str) -> Result<MediaDetails, BuildError> {
        let missing = self.missing_marker();
        let field = |key: &str| text_or(raw, key, missing);

        Ok(MediaDetails {
            imdb_id: self.required(raw, kind, "imdbID")?.into_owned(),
            title: self.required(raw, kind, "Title")?.into_owned(),
            plot: self.optional(raw, "Plot"),
            genres: parse_list(&field("Genre"), missing),
            languages: parse_list(&field("Language"), missing),
            countries: parse_list(&field("Country"), missing),
            actors: parse_list(&field("Actors"), missing),
            writers: parse_list(&field("Writer"), missing),
            directors: parse_list(&field("Director"), missing),
            rated: self.optional(raw, "Rated"),
            poster: self.optional(raw, "Poster"),
            awards: self.optional(raw, "Awards"),
            imdb_rating: parse_number(&field("imdbRating"), missing).as_f64(),
            imdb_votes: parse_number(&field("imdbVotes"), missing)
                .as_u64()
                .unwrap_or(0),
            metascore: parse_number(&field("Metascore"), missing).as_f64(),
            runtime: parse_duration(&field("Runtime"), missing),
            release_date: parse_date(&field("Released"), missing),
            ratings: ratings(raw),
        })
    }

    fn expect_success(&self, raw: &RawResponse) -> Result<ResponseKind, BuildError> {
        match classify(raw) {
            Classification::Success(kind) => Ok(kind),
            Classification::Failure { message } => Err(BuildError::UpstreamFailure(message)),
            Classification::Unclassifiable => Err(BuildError::Unclassifiable),
        }
    }

    fn expect_kind(
        &self,
        raw: &RawResponse,
        expected: ResponseKind,
        label: &'static str,
    ) -> Result<(), BuildError> {
        let actual = self.expect_success(raw)?;
        if actual == expected {
            Ok(())
        } else {
            Err(BuildError::UnexpectedKind {
                expected: label,
                actual,
            })
        }
    }

    fn required<'a>(
        &self,
        raw: &'a RawResponse,
        kind: &'static str,
        field: &'static str,
    ) -> Result<Cow<'a, str>, BuildError> {
        match text(raw, field) {
            Some(value) if !self.is_missing(&value) => Ok(value),
            _ => Err(BuildError::MissingField { kind, field }),
        }
    }

    fn required_index(
        &self,
        raw: &RawResponse,
        kind: &'static str,
        field: &'static str,
    ) -> Result<u32, BuildError> {
        let value = self.required(raw, kind, field)?;
        parse_number(&value, self.missing_marker())
            .as_u32()
            .ok_or_else(|| BuildError::InvalidField {
                kind,
                field,
                value: value.into_owned(),
            })
    }

    fn optional(&self, raw: &RawResponse, field: &str) -> Option<String> {
        text(raw, field)
            .filter(|value| !self.is_missing(value))
            .map(|value| value.trim().to_string())
    }

    fn is_missing(&self, value: &str) -> bool {
        let value = value.trim();
        value.is_empty() || value == self.missing_marker.trim()
    }
}

/// Carries every reported external rating through as source/raw-value pairs
fn ratings(raw: &RawResponse) -> Vec<Rating> {
    let Some(entries) = raw.get("Ratings").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let source = text(entry, "Source")?;
            let value = text(entry, "Value")?;
            Some(Rating {
                source: source.into_owned(),
                value: value.into_owned(),
            })
        })
        .collect()
}
