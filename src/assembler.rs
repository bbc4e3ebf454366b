//! Season assembly
//!
//! Walks the season pages of a series in ascending order until the catalog
//! stops returning episodes, and numbers every episode across the whole series.

use crate::ProgressEvent;
use crate::builder::{BuildError, ResourceBuilder};
use crate::resources::{EpisodeResource, MiniEpisode};
use crate::response::{Classification, classify, is_success};
use crate::transport::{CatalogQuery, Transport, TransportError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on season requests per series
pub const DEFAULT_MAX_SEASONS: u32 = 100;

/// How the series-wide offset advances after each season
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accumulation {
    /// Advance by the highest episode number seen in the season
    #[default]
    #[serde(rename = "max-number")]
    MaxEpisodeNumber,
    /// Advance by the number of episodes listed in the season
    #[serde(rename = "episode-count")]
    EpisodeCount,
}

impl Accumulation {
    fn season_span(self, season: &[MiniEpisode]) -> u32 {
        match self {
            Accumulation::MaxEpisodeNumber => season.iter().map(|e| e.index_in_season).max().unwrap_or(0),
            Accumulation::EpisodeCount => u32::try_from(season.len()).unwrap_or(u32::MAX),
        }
    }
}

/// Errors that abort an assembly
///
/// Partial results are discarded whenever one of these is returned.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// A season page request failed outright
    #[error("Failed to fetch season {season}: {source}")]
    Transport {
        season: u32,
        #[source]
        source: TransportError,
    },

    /// A season page lists an episode that cannot be built
    #[error("Season {season} is malformed: {source}")]
    MalformedSeason {
        season: u32,
        #[source]
        source: BuildError,
    },

    /// An episode detail request failed outright
    #[error("Failed to fetch episode {episode_id}: {source}")]
    EpisodeTransport {
        episode_id: String,
        #[source]
        source: TransportError,
    },

    /// The catalog has no details for an episode it listed
    #[error("Catalog has no details for episode {episode_id} ({imdb_id})")]
    EpisodeNotFound { episode_id: String, imdb_id: String },

    /// An episode detail response cannot be built
    #[error("Episode {episode_id} is malformed: {source}")]
    MalformedEpisode {
        episode_id: String,
        #[source]
        source: BuildError,
    },
}

/// Assembles the episode list of a series from its season pages
pub struct SeasonAssembler<'a, T: Transport + ?Sized> {
    transport: &'a T,
    builder: &'a ResourceBuilder,
    max_seasons: u32,
    accumulation: Accumulation,
}

impl<'a, T: Transport + ?Sized> SeasonAssembler<'a, T> {
    pub fn new(transport: &'a T, builder: &'a ResourceBuilder) -> Self {
        Self {
            transport,
            builder,
            max_seasons: DEFAULT_MAX_SEASONS,
            accumulation: Accumulation::default(),
        }
    }

    pub fn with_max_seasons(mut self, max_seasons: u32) -> Self {
        self.max_seasons = max_seasons;
        self
    }

    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Returns every episode of the series, season by season
    pub fn assemble(&self, series_id: &str) -> Result<Vec<MiniEpisode>, AssemblyError> {
        self.assemble_with_progress(series_id, |_| {})
    }

    /// Like [`assemble`](Self::assemble), reporting progress through a callback
    ///
    /// Seasons are requested strictly one after another starting at 1. The
    /// first season that is reported missing or lists no episodes ends the
    /// series; no later season is requested.
    pub fn assemble_with_progress<F>(&self, series_id: &str, mut progress: F) -> Result<Vec<MiniEpisode>, AssemblyError>
    where
        F: FnMut(ProgressEvent),
    {
        let mut episodes = Vec::new();
        let mut previous_episodes: u32 = 0;
        let mut season_count: u32 = 0;
        let mut exhausted = false;

        for season_index in 1..=self.max_seasons {
            progress(ProgressEvent::FetchingSeason {
                series_id: series_id.to_string(),
                season_index,
            });
            tracing::debug!(series_id, season_index, "requesting season page");

            let raw = self
                .transport
                .fetch_season_page(series_id, season_index)
                .map_err(|source| AssemblyError::Transport {
                    season: season_index,
                    source,
                })?;

            if !is_success(&raw) {
                tracing::debug!(series_id, season_index, "season not available, series complete");
                exhausted = true;
                break;
            }

            let season = self
                .builder
                .build_season_page(&raw, season_index, previous_episodes)
                .map_err(|source| AssemblyError::MalformedSeason {
                    season: season_index,
                    source,
                })?;

            if season.is_empty() {
                tracing::debug!(series_id, season_index, "season lists no episodes, series complete");
                exhausted = true;
                break;
            }

            previous_episodes = previous_episodes.saturating_add(self.accumulation.season_span(&season));
            season_count += 1;
            progress(ProgressEvent::SeasonAssembled {
                season_index,
                episode_count: season.len(),
            });
            episodes.extend(season);
        }

        if !exhausted {
            tracing::warn!(
                series_id,
                max_seasons = self.max_seasons,
                "stopped at the season limit; later seasons were not requested"
            );
        }

        progress(ProgressEvent::AssemblyComplete {
            season_count,
            episode_count: episodes.len(),
        });

        Ok(episodes)
    }

    /// Assembles the series and then fetches the full resource of every episode
    ///
    /// Episodes are fetched in series order and built exactly as the catalog
    /// returns them; `index_in_series` is the assembled position.
    pub fn assemble_full<F>(&self, series_id: &str, mut progress: F) -> Result<Vec<EpisodeResource>, AssemblyError>
    where
        F: FnMut(ProgressEvent),
    {
        let minis = self.assemble_with_progress(series_id, &mut progress)?;
        let total = minis.len();

        minis
            .into_iter()
            .enumerate()
            .map(|(index, mini)| {
                progress(ProgressEvent::FetchingEpisode {
                    episode_id: mini.episode_id.clone(),
                    index: index + 1,
                    total,
                });
                self.fetch_episode(&mini)
            })
            .collect()
    }

    fn fetch_episode(&self, mini: &MiniEpisode) -> Result<EpisodeResource, AssemblyError> {
        tracing::debug!(episode_id = %mini.episode_id, imdb_id = %mini.imdb_id, "requesting episode details");

        let raw = self
            .transport
            .fetch_media(&CatalogQuery::Id(mini.imdb_id.clone()))
            .map_err(|source| AssemblyError::EpisodeTransport {
                episode_id: mini.episode_id.clone(),
                source,
            })?;

        if let Classification::Failure { .. } = classify(&raw) {
            return Err(AssemblyError::EpisodeNotFound {
                episode_id: mini.episode_id.clone(),
                imdb_id: mini.imdb_id.clone(),
            });
        }

        let mut episode = self
            .builder
            .build_episode(&raw)
            .map_err(|source| AssemblyError::MalformedEpisode {
                episode_id: mini.episode_id.clone(),
                source,
            })?;
        episode.index_in_series = Some(mini.index_in_series);
        Ok(episode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::RawResponse;
    use crate::transport::{FixtureRequest, FixtureTransport};
    use serde_json::{Value, json};

    const SERIES_ID: &str = "tt7569592";

    fn raw(value: Value) -> RawResponse {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    /// A season page with (episode number, rating) entries
    fn season(season_index: u32, entries: &[(u32, &str)]) -> RawResponse {
        let episodes: Vec<Value> = entries
            .iter()
            .map(|(number, rating)| {
                json!({
                    "Title": format!("Episode {season_index}.{number}"),
                    "Released": "2018-10-26",
                    "Episode": number.to_string(),
                    "imdbRating": rating,
                    "imdbID": format!("tt9{season_index:03}{number:03}")
                })
            })
            .collect();
        raw(json!({
            "Title": "Chilling Adventures of Sabrina",
            "Season": season_index.to_string(),
            "totalSeasons": "2",
            "Episodes": episodes,
            "Response": "True"
        }))
    }

    fn positions(episodes: &[MiniEpisode]) -> Vec<u32> {
        episodes.iter().map(|e| e.index_in_series).collect()
    }

    #[test]
    fn test_concrete_scenario() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.5"), (2, "8.1")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "N/A")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder).assemble(SERIES_ID).unwrap();

        assert_eq!(episodes.len(), 3);
        assert_eq!(positions(&episodes), vec![1, 2, 3]);
        assert_eq!(episodes[0].imdb_rating, 7.5);
        assert_eq!(episodes[1].imdb_rating, 8.1);
        assert!(episodes[2].imdb_rating.is_nan());
        assert_eq!(episodes[2].episode_id, "S02E01");
        assert_eq!(transport.requested_seasons(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_season_terminates() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "7.0"), (2, "7.1")]))
            .with_season(SERIES_ID, 3, season(3, &[]))
            .with_season(SERIES_ID, 4, season(4, &[(1, "9.9")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder).assemble(SERIES_ID).unwrap();

        assert_eq!(episodes.len(), 3);
        assert!(episodes.iter().all(|e| e.season_index <= 2));
        assert_eq!(transport.requested_seasons(), vec![1, 2, 3]);
    }

    #[test]
    fn test_success_without_episode_list_terminates() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0")]))
            .with_season(SERIES_ID, 2, raw(json!({"Response": "True", "Title": "x"})));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder).assemble(SERIES_ID).unwrap();

        assert_eq!(episodes.len(), 1);
        assert_eq!(transport.requested_seasons(), vec![1, 2]);
    }

    #[test]
    fn test_accumulation_uses_max_number() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0"), (2, "7.0"), (5, "7.0")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "7.0")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder).assemble(SERIES_ID).unwrap();

        assert_eq!(positions(&episodes), vec![1, 2, 5, 6]);
    }

    #[test]
    fn test_accumulation_by_episode_count() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0"), (2, "7.0"), (5, "7.0")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "7.0")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder)
            .with_accumulation(Accumulation::EpisodeCount)
            .assemble(SERIES_ID)
            .unwrap();

        assert_eq!(positions(&episodes), vec![1, 2, 5, 4]);
    }

    #[test]
    fn test_numbering_field_wins_over_list_order() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(2, "7.0"), (1, "7.0"), (3, "7.0")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "7.0")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder).assemble(SERIES_ID).unwrap();

        let labels: Vec<_> = episodes.iter().map(|e| e.episode_id.as_str()).collect();
        assert_eq!(labels, vec!["S01E02", "S01E01", "S01E03", "S02E01"]);
        assert_eq!(positions(&episodes), vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_monotonic_with_distinct_numbers() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0"), (2, "7.0"), (3, "7.0")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "7.0"), (2, "7.0")]))
            .with_season(SERIES_ID, 3, season(3, &[(1, "7.0"), (2, "7.0"), (3, "7.0"), (4, "7.0")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder).assemble(SERIES_ID).unwrap();

        assert!(positions(&episodes).windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(positions(&episodes).last(), Some(&9));
    }

    #[test]
    fn test_transport_error_aborts_assembly() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0")]))
            .with_season_error(SERIES_ID, 2, "connection reset")
            .with_season(SERIES_ID, 3, season(3, &[(1, "7.0")]));
        let builder = ResourceBuilder::default();

        let error = SeasonAssembler::new(&transport, &builder)
            .assemble(SERIES_ID)
            .unwrap_err();

        assert!(matches!(error, AssemblyError::Transport { season: 2, .. }));
        assert_eq!(transport.requested_seasons(), vec![1, 2]);
    }

    #[test]
    fn test_missing_episode_number_is_malformed() {
        let page = raw(json!({
            "Season": "1",
            "Episodes": [{"Title": "Pilot", "imdbID": "tt9001001", "imdbRating": "7.0"}],
            "Response": "True"
        }));
        let transport = FixtureTransport::new().with_season(SERIES_ID, 1, page);
        let builder = ResourceBuilder::default();

        let error = SeasonAssembler::new(&transport, &builder)
            .assemble(SERIES_ID)
            .unwrap_err();

        assert!(matches!(
            error,
            AssemblyError::MalformedSeason {
                season: 1,
                source: BuildError::MissingField { field: "Episode", .. }
            }
        ));
    }

    #[test]
    fn test_season_limit_stops_the_loop() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0")]))
            .with_season(SERIES_ID, 2, season(2, &[(1, "7.0")]))
            .with_season(SERIES_ID, 3, season(3, &[(1, "7.0")]));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder)
            .with_max_seasons(2)
            .assemble(SERIES_ID)
            .unwrap();

        assert_eq!(episodes.len(), 2);
        assert_eq!(transport.requested_seasons(), vec![1, 2]);
    }

    #[test]
    fn test_progress_events() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.0"), (2, "7.0")]));
        let builder = ResourceBuilder::default();
        let mut events = Vec::new();

        SeasonAssembler::new(&transport, &builder)
            .assemble_with_progress(SERIES_ID, |event| events.push(event))
            .unwrap();

        assert!(matches!(events[0], ProgressEvent::FetchingSeason { season_index: 1, .. }));
        assert!(matches!(
            events[1],
            ProgressEvent::SeasonAssembled {
                season_index: 1,
                episode_count: 2
            }
        ));
        assert!(matches!(events[2], ProgressEvent::FetchingSeason { season_index: 2, .. }));
        assert!(matches!(
            events[3],
            ProgressEvent::AssemblyComplete {
                season_count: 1,
                episode_count: 2
            }
        ));
    }

    fn full_episode(number: u32, season_index: Option<u32>) -> RawResponse {
        let mut episode = raw(json!({
            "Title": format!("Episode 1.{number}"),
            "Released": "26 Oct 2018",
            "Episode": number.to_string(),
            "Runtime": "60 min",
            "imdbRating": "7.9",
            "imdbVotes": "1,024",
            "imdbID": format!("tt9001{number:03}"),
            "seriesID": SERIES_ID,
            "Type": "episode",
            "Response": "True"
        }));
        if let Some(season_index) = season_index {
            episode.insert("Season".to_string(), Value::from(season_index.to_string()));
        }
        episode
    }

    #[test]
    fn test_assemble_full() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.9"), (2, "8.0")]))
            .with_media(CatalogQuery::Id("tt9001001".to_string()), full_episode(1, Some(1)))
            .with_media(CatalogQuery::Id("tt9001002".to_string()), full_episode(2, Some(1)));
        let builder = ResourceBuilder::default();

        let episodes = SeasonAssembler::new(&transport, &builder)
            .assemble_full(SERIES_ID, |_| {})
            .unwrap();

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].details.imdb_votes, 1024);
        assert_eq!(episodes[0].index_in_series, Some(1));
        assert_eq!(episodes[1].index_in_season, 2);
        assert_eq!(episodes[1].series_id, SERIES_ID);
        assert_eq!(episodes[1].index_in_series, Some(2));

        let media_requests = transport
            .requests()
            .into_iter()
            .filter(|request| matches!(request, FixtureRequest::Media(_)))
            .count();
        assert_eq!(media_requests, 2);
    }

    #[test]
    fn test_assemble_full_episode_without_season_is_malformed() {
        let transport = FixtureTransport::new()
            .with_season(SERIES_ID, 1, season(1, &[(1, "7.9")]))
            .with_media(CatalogQuery::Id("tt9001001".to_string()), full_episode(1, None));
        let builder = ResourceBuilder::default();

        let error = SeasonAssembler::new(&transport, &builder)
            .assemble_full(SERIES_ID, |_| {})
            .unwrap_err();

        assert!(matches!(
            error,
            AssemblyError::MalformedEpisode {
                ref episode_id,
                source: BuildError::MissingField { field: "Season", .. },
            } if episode_id == "S01E01"
        ));
    }

    #[test]
    fn test_assemble_full_missing_details_is_an_error() {
        let transport = FixtureTransport::new().with_season(SERIES_ID, 1, season(1, &[(1, "7.9")]));
        let builder = ResourceBuilder::default();

        let error = SeasonAssembler::new(&transport, &builder)
            .assemble_full(SERIES_ID, |_| {})
            .unwrap_err();

        assert!(matches!(
            error,
            AssemblyError::EpisodeNotFound { ref episode_id, .. } if episode_id == "S01E01"
        ));
    }
}
