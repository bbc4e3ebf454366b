//! Canonical resource model for catalog titles
//!
//! These types are what the rest of the crate (and its users) work with once a
//! raw response has been normalized. The raw key/value shape never leaks past
//! the builder.

use crate::coercion::{DEFAULT_MISSING_MARKER, Runtime, YearSpan, nan_as_null};
use crate::response::MediaKind;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static RE_EPISODE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*s(\d+)\s*e(\d+)\s*$").unwrap());

/// Line printed for every unused episode number inside a season summary
const MISSING_EPISODE_LINE: &str = "<--missing-->";

/// One external rating as reported by the catalog
///
/// The value is carried through verbatim (`"7.8/10"`, `"63/100"`, `"91%"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub source: String,
    pub value: String,
}

impl Rating {
    /// Normalizes the raw value onto a 0–10 scale
    ///
    /// Returns `None` for values in a format this doesn't recognize.
    pub fn score_out_of_ten(&self) -> Option<f64> {
        let value = self.value.trim();

        if let Some(percent) = value.strip_suffix('%') {
            return percent.trim().parse::<f64>().ok().map(|p| p / 10.0);
        }

        let (score, scale) = value.split_once('/')?;
        let score: f64 = score.trim().parse().ok()?;
        let scale: f64 = scale.trim().parse().ok()?;
        if scale <= 0.0 {
            return None;
        }
        Some(score * 10.0 / scale)
    }
}

/// Fields shared by every kind of title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDetails {
    /// Catalog identifier, e.g. `tt7569592`
    pub imdb_id: String,
    pub title: String,
    pub plot: Option<String>,
    /// Genres in source order
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub countries: Vec<String>,
    pub actors: Vec<String>,
    pub writers: Vec<String>,
    pub directors: Vec<String>,
    /// Content rating such as `TV-14`
    pub rated: Option<String>,
    /// Poster URL
    pub poster: Option<String>,
    pub awards: Option<String>,
    /// Rating in [0, 10], or NaN when missing
    #[serde(with = "nan_as_null")]
    pub imdb_rating: f64,
    /// Vote count, 0 when missing
    pub imdb_votes: u64,
    /// Metacritic score, or NaN when missing
    #[serde(with = "nan_as_null")]
    pub metascore: f64,
    pub runtime: Option<Runtime>,
    pub release_date: Option<NaiveDate>,
    /// External ratings in source order
    pub ratings: Vec<Rating>,
}

/// A normalized catalog title
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaResource {
    Series(SeriesResource),
    #[serde(rename = "movie")]
    Film(FilmResource),
    Episode(EpisodeResource),
}

impl MediaResource {
    pub fn details(&self) -> &MediaDetails {
        match self {
            MediaResource::Series(series) => &series.details,
            MediaResource::Film(film) => &film.details,
            MediaResource::Episode(episode) => &episode.details,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaResource::Series(_) => MediaKind::Series,
            MediaResource::Film(_) => MediaKind::Movie,
            MediaResource::Episode(_) => MediaKind::Episode,
        }
    }

    pub fn imdb_id(&self) -> &str {
        &self.details().imdb_id
    }

    pub fn title(&self) -> &str {
        &self.details().title
    }

    pub fn as_series(&self) -> Option<&SeriesResource> {
        match self {
            MediaResource::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_series(self) -> Option<SeriesResource> {
        match self {
            MediaResource::Series(series) => Some(series),
            _ => None,
        }
    }
}

/// A TV series with its (lazily assembled) episode list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResource {
    #[serde(flatten)]
    pub details: MediaDetails,
    pub total_seasons: u32,
    pub years: YearSpan,
    /// Episodes in season-major order; empty until seasons are assembled
    pub episodes: Vec<MiniEpisode>,
}

impl SeriesResource {
    /// Iterates over the episodes grouped into consecutive seasons
    pub fn seasons(&self) -> impl Iterator<Item = SeasonView<'_>> {
        self.episodes
            .chunk_by(|a, b| a.season_index == b.season_index)
            .map(|episodes| SeasonView {
                index: episodes[0].season_index,
                episodes,
            })
    }

    /// Returns the season with the given 1-based index
    pub fn season(&self, index: u32) -> Option<SeasonView<'_>> {
        self.seasons().find(|season| season.index == index)
    }

    /// Looks up an episode by its season/episode key
    pub fn episode(&self, key: EpisodeKey) -> Option<&MiniEpisode> {
        self.episodes
            .iter()
            .find(|episode| episode.season_index == key.season && episode.index_in_season == key.episode)
    }

    /// Renders a text outline of the series and its seasons
    pub fn summary(&self) -> SeriesSummary<'_> {
        SeriesSummary(self)
    }
}

/// A film
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilmResource {
    #[serde(flatten)]
    pub details: MediaDetails,
    pub year: Option<i32>,
    /// Box office takings in whole currency units
    pub box_office: Option<u64>,
    /// Home (DVD) release date
    pub release_date_home: Option<NaiveDate>,
    pub production: Option<String>,
    pub website: Option<String>,
}

/// A single episode with full title details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeResource {
    #[serde(flatten)]
    pub details: MediaDetails,
    /// 1-based season number
    pub season_index: u32,
    /// Episode number within the season
    pub index_in_season: u32,
    /// Position within the whole series, known only after season assembly
    pub index_in_series: Option<u32>,
    /// Catalog identifier of the parent series
    pub series_id: String,
}

impl EpisodeResource {
    pub fn key(&self) -> EpisodeKey {
        EpisodeKey::new(self.season_index, self.index_in_season)
    }
}

/// Lightweight episode record produced while assembling a series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniEpisode {
    pub title: String,
    pub imdb_id: String,
    #[serde(with = "nan_as_null")]
    pub imdb_rating: f64,
    pub release_date: Option<NaiveDate>,
    /// Label such as `S02E10`
    pub episode_id: String,
    pub season_index: u32,
    /// Episode number as reported by the season page
    pub index_in_season: u32,
    /// Episodes of all earlier seasons plus `index_in_season`
    pub index_in_series: u32,
}

impl MiniEpisode {
    pub fn key(&self) -> EpisodeKey {
        EpisodeKey::new(self.season_index, self.index_in_season)
    }
}

/// Episodes of one season, borrowed from a [`SeriesResource`]
#[derive(Debug, Clone, Copy)]
pub struct SeasonView<'a> {
    pub index: u32,
    pub episodes: &'a [MiniEpisode],
}

impl SeasonView<'_> {
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Mean rating of the season's rated episodes (NaN if none are rated)
    pub fn mean_rating(&self) -> f64 {
        crate::table::mean_rating(self.episodes.iter().map(|episode| episode.imdb_rating))
    }
}

/// Season/episode pair identifying an episode within its series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeKey {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for EpisodeKey {
    /// Both components are padded to at least two digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Error for text that isn't an `SnnEnn` key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Not an episode key (expected e.g. S01E02): {0}")]
pub struct ParseEpisodeKeyError(String);

impl FromStr for EpisodeKey {
    type Err = ParseEpisodeKeyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseEpisodeKeyError(text.to_string());
        let captures = RE_EPISODE_KEY.captures(text).ok_or_else(invalid)?;
        let season = captures[1].parse().map_err(|_| invalid())?;
        let episode = captures[2].parse().map_err(|_| invalid())?;
        Ok(Self { season, episode })
    }
}

/// Formats the label for an episode, e.g. `S02E10`
pub fn episode_label(season_index: u32, index_in_season: u32) -> String {
    EpisodeKey::new(season_index, index_in_season).to_string()
}

/// Text outline of a series, see [`SeriesResource::summary`]
pub struct SeriesSummary<'a>(&'a SeriesResource);

impl fmt::Display for SeriesSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let series = self.0;
        let details = &series.details;

        writeln!(f, "SeriesResource('{}')", details.title)?;
        writeln!(f, "\timdbId:      {}", details.imdb_id)?;
        writeln!(f, "\tyear(s):     {}", series.years)?;
        match details.runtime {
            Some(runtime) => writeln!(f, "\truntime:     {runtime}")?,
            None => writeln!(f, "\truntime:     {DEFAULT_MISSING_MARKER}")?,
        }
        writeln!(f, "\timdbRating:  {}", format_rating(details.imdb_rating))?;
        writeln!(
            f,
            "\tplot:        {}",
            details.plot.as_deref().unwrap_or(DEFAULT_MISSING_MARKER)
        )?;

        for season in series.seasons() {
            writeln!(f, "\tSeason {} ({} episodes)", season.index, season.len())?;

            let mut previous: Option<u32> = None;
            for episode in season.episodes {
                if let Some(previous) = previous {
                    let gap = episode.index_in_season.saturating_sub(previous).saturating_sub(1);
                    for _ in 0..gap {
                        writeln!(f, "\t\t{MISSING_EPISODE_LINE}")?;
                    }
                }
                previous = Some(episode.index_in_season);

                writeln!(
                    f,
                    "\t\t{} - {} ({})",
                    episode.episode_id,
                    episode.title,
                    format_rating(episode.imdb_rating)
                )?;
            }
        }

        Ok(())
    }
}

/// Renders a rating, showing the missing-marker for the NaN sentinel
pub fn format_rating(rating: f64) -> String {
    if rating.is_nan() {
        DEFAULT_MISSING_MARKER.to_string()
    } else {
        format!("{rating:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(imdb_id: &str, title: &str) -> MediaDetails {
        MediaDetails {
            imdb_id: imdb_id.to_string(),
            title: title.to_string(),
            plot: None,
            genres: Vec::new(),
            languages: Vec::new(),
            countries: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
            directors: Vec::new(),
            rated: None,
            poster: None,
            awards: None,
            imdb_rating: f64::NAN,
            imdb_votes: 0,
            metascore: f64::NAN,
            runtime: None,
            release_date: None,
            ratings: Vec::new(),
        }
    }

    fn mini(season: u32, episode: u32, index_in_series: u32, rating: f64) -> MiniEpisode {
        MiniEpisode {
            title: format!("Episode {episode}"),
            imdb_id: format!("tt{:07}", season * 100 + episode),
            imdb_rating: rating,
            release_date: None,
            episode_id: episode_label(season, episode),
            season_index: season,
            index_in_season: episode,
            index_in_series,
        }
    }

    fn series() -> SeriesResource {
        SeriesResource {
            details: details("tt0000001", "Example Show"),
            total_seasons: 2,
            years: YearSpan { start: Some(2018), end: None },
            episodes: vec![
                mini(1, 1, 1, 7.0),
                mini(1, 2, 2, 8.0),
                mini(1, 5, 5, f64::NAN),
                mini(2, 1, 6, 9.0),
            ],
        }
    }

    #[test]
    fn test_episode_label() {
        assert_eq!(episode_label(2, 10), "S02E10");
        assert_eq!(episode_label(12, 3), "S12E03");
        assert_eq!(episode_label(1, 5), "S01E05");
        assert_eq!(episode_label(1, 123), "S01E123");
    }

    #[test]
    fn test_parse_episode_key() {
        assert_eq!("S02E10".parse::<EpisodeKey>(), Ok(EpisodeKey::new(2, 10)));
        assert_eq!("s1e3".parse::<EpisodeKey>(), Ok(EpisodeKey::new(1, 3)));
        assert!("Season 1".parse::<EpisodeKey>().is_err());
        assert!("S01".parse::<EpisodeKey>().is_err());
    }

    #[test]
    fn test_seasons_are_grouped_in_order() {
        let series = series();
        let seasons: Vec<_> = series.seasons().map(|s| (s.index, s.len())).collect();
        assert_eq!(seasons, vec![(1, 3), (2, 1)]);
        assert!(series.season(3).is_none());
        assert_eq!(series.season(1).map(|s| s.mean_rating()), Some(7.5));
    }

    #[test]
    fn test_episode_lookup() {
        let series = series();
        let episode = series.episode("S01E05".parse().unwrap()).unwrap();
        assert_eq!(episode.index_in_series, 5);
        assert!(series.episode(EpisodeKey::new(1, 3)).is_none());
        assert!(series.episode(EpisodeKey::new(3, 1)).is_none());
    }

    #[test]
    fn test_summary_marks_gaps() {
        let summary = series().summary().to_string();
        assert!(summary.starts_with("SeriesResource('Example Show')"));
        assert_eq!(summary.matches(MISSING_EPISODE_LINE).count(), 2);
        assert!(summary.contains("\t\tS01E05 - Episode 5 (N/A)"));
        assert!(summary.contains("\tSeason 2 (1 episodes)"));
    }

    #[test]
    fn test_rating_score_out_of_ten() {
        let rating = |value: &str| Rating {
            source: "x".to_string(),
            value: value.to_string(),
        };
        assert_eq!(rating("7.8/10").score_out_of_ten(), Some(7.8));
        assert_eq!(rating("63/100").score_out_of_ten(), Some(6.3));
        assert_eq!(rating("91%").score_out_of_ten(), Some(9.1));
        assert_eq!(rating("N/A").score_out_of_ten(), None);
        assert_eq!(rating("5/0").score_out_of_ten(), None);
    }

    #[test]
    fn test_resource_json_round_trip_keeps_sentinels() {
        let resource = MediaResource::Series(series());
        let json = serde_json::to_string(&resource).unwrap();
        let back: MediaResource = serde_json::from_str(&json).unwrap();

        let series = back.as_series().unwrap();
        assert_eq!(back.kind(), MediaKind::Series);
        assert!(series.details.imdb_rating.is_nan());
        assert!(series.episodes[2].imdb_rating.is_nan());
        assert_eq!(series.episodes[3].index_in_series, 6);
    }
}
