//! Flat per-episode table of an assembled series
//!
//! Every row carries the parent series' title and identifier so that rows can
//! be grouped or charted without going back to the series.

use crate::coercion::nan_as_null;
use crate::resources::{SeriesResource, format_rating};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column order of [`SeriesTable::to_tsv`]
pub const TSV_COLUMNS: [&str; 10] = [
    "episodeId",
    "title",
    "imdbRating",
    "releaseDate",
    "seasonIndex",
    "indexInSeason",
    "indexInSeries",
    "seriesTitle",
    "seriesId",
    "imdbId",
];

/// One episode of a series with the series denormalized onto it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRow {
    pub episode_id: String,
    pub title: String,
    #[serde(with = "nan_as_null")]
    pub imdb_rating: f64,
    pub release_date: Option<NaiveDate>,
    pub season_index: u32,
    pub index_in_season: u32,
    pub index_in_series: u32,
    pub series_title: String,
    pub series_id: String,
    pub imdb_id: String,
}

/// The rows of one series, ordered by series position unless re-sorted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesTable {
    pub rows: Vec<SeriesRow>,
}

impl SeriesTable {
    /// Projects an assembled series into rows ordered by `index_in_series`
    ///
    /// The sort is stable, so episodes sharing a position keep their
    /// assembled order.
    pub fn from_series(series: &SeriesResource) -> Self {
        let mut rows: Vec<SeriesRow> = series
            .episodes
            .iter()
            .map(|episode| SeriesRow {
                episode_id: episode.episode_id.clone(),
                title: episode.title.clone(),
                imdb_rating: episode.imdb_rating,
                release_date: episode.release_date,
                season_index: episode.season_index,
                index_in_season: episode.index_in_season,
                index_in_series: episode.index_in_series,
                series_title: series.details.title.clone(),
                series_id: series.details.imdb_id.clone(),
                imdb_id: episode.imdb_id.clone(),
            })
            .collect();
        rows.sort_by_key(|row| row.index_in_series);
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Re-orders rows by air date; rows without a date go last
    pub fn sort_by_release_date(&mut self) {
        self.rows
            .sort_by_key(|row| (row.release_date.is_none(), row.release_date, row.index_in_series));
    }

    /// Mean rating per season, leaving unrated episodes out
    pub fn season_mean_ratings(&self) -> BTreeMap<u32, f64> {
        let mut by_season: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for row in &self.rows {
            by_season.entry(row.season_index).or_default().push(row.imdb_rating);
        }
        by_season
            .into_iter()
            .map(|(season, ratings)| (season, mean_rating(ratings)))
            .collect()
    }

    /// Renders the table as tab-separated values with a header line
    pub fn to_tsv(&self) -> String {
        let mut out = TSV_COLUMNS.join("\t");
        out.push('\n');
        for row in &self.rows {
            let release_date = row
                .release_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let fields = [
                row.episode_id.clone(),
                tsv_field(&row.title),
                format_rating(row.imdb_rating),
                release_date,
                row.season_index.to_string(),
                row.index_in_season.to_string(),
                row.index_in_series.to_string(),
                tsv_field(&row.series_title),
                row.series_id.clone(),
                row.imdb_id.clone(),
            ];
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        out
    }
}

fn tsv_field(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

/// Arithmetic mean of the ratings that are present
///
/// Missing ratings (`NaN`) are left out rather than counted as zero. Returns
/// `NaN` when no rating is present.
pub fn mean_rating(ratings: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = ratings
        .into_iter()
        .filter(|rating| !rating.is_nan())
        .fold((0.0, 0u32), |(sum, count), rating| (sum + rating, count + 1));

    if count == 0 { f64::NAN } else { sum / f64::from(count) }
}
