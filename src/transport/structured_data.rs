//! Extraction of the schema.org data embedded in title pages
//!
//! Title pages carry an `application/ld+json` block describing the title. This
//! module pulls it out of the HTML and maps it onto the same raw response shape
//! the catalog API returns, so the rest of the crate never sees the difference.

use super::TransportError;
use crate::resources::EpisodeKey;
use crate::response::{FAILURE_LITERAL, RawResponse, STATUS_FIELD, SUCCESS_LITERAL};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

static RE_LD_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#).unwrap()
});
static RE_TITLE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"tt\d{7,8}").unwrap());
// Episode list entries link with an episode ref tag (`ttep_ep1`, `ttep_ep_1`)
static RE_EPISODE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="/title/(tt\d{7,8})/?\?ref_=ttep_ep"#).unwrap());
// `S1.E3`, possibly split by markup such as `S1<!-- -->.<!-- -->E3`
static RE_EPISODE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bS(\d{1,3})(?:\s|<[^>]*>)*\.(?:\s|<[^>]*>)*E(\d{1,4})\b").unwrap());

/// Source label used for the site's own rating
const RATING_SOURCE: &str = "Internet Movie Database";

/// Extracts and parses the first structured data block of a page
pub(crate) fn extract_json_ld(html: &str) -> Result<Value, TransportError> {
    let block = RE_LD_JSON
        .captures(html)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| TransportError::ParseError("page has no structured data block".to_string()))?;

    serde_json::from_str(block.as_str().trim()).map_err(|e| TransportError::ParseError(e.to_string()))
}

/// Removes the `@` prefix from keys, recursively (`@type` becomes `type`)
pub(crate) fn strip_at_prefixes(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = key.strip_prefix('@').map(str::to_string).unwrap_or(key);
                    (key, strip_at_prefixes(value))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_at_prefixes).collect()),
        other => other,
    }
}

/// Maps schema.org types onto catalog type tags; unknown types pass through
fn type_tag(schema_type: &str) -> &str {
    match schema_type {
        "TVSeries" => "series",
        "Movie" => "movie",
        "TVEpisode" => "episode",
        other => other,
    }
}

/// Maps stripped structured data onto the catalog response shape
///
/// Fields the site doesn't provide are left out; the builder treats them as
/// missing.
pub(crate) fn to_raw_response(data: &Map<String, Value>, requested_id: &str) -> RawResponse {
    let mut raw = RawResponse::new();
    raw.insert(STATUS_FIELD.to_string(), Value::from(SUCCESS_LITERAL));

    if let Some(schema_type) = data.get("type").and_then(Value::as_str) {
        raw.insert("Type".to_string(), Value::from(type_tag(schema_type)));
    }

    let imdb_id = data
        .get("url")
        .and_then(Value::as_str)
        .and_then(title_id)
        .unwrap_or(requested_id);
    raw.insert("imdbID".to_string(), Value::from(imdb_id));

    if let Some(name) = data.get("name").and_then(Value::as_str) {
        raw.insert("Title".to_string(), Value::from(decode_html(name)));
    }
    if let Some(description) = data.get("description").and_then(Value::as_str) {
        raw.insert("Plot".to_string(), Value::from(decode_html(description)));
    }

    insert_str(&mut raw, "Poster", data.get("image"));
    insert_str(&mut raw, "Rated", data.get("contentRating"));
    insert_str(&mut raw, "Released", data.get("datePublished"));
    insert_str(
        &mut raw,
        "Runtime",
        data.get("duration").or_else(|| data.get("timeRequired")),
    );

    for (field, source) in [
        ("Genre", data.get("genre")),
        ("Actors", data.get("actor")),
        ("Director", data.get("director")),
        ("Writer", data.get("creator")),
    ] {
        let names = names(source);
        if !names.is_empty() {
            raw.insert(field.to_string(), Value::from(names.join(", ")));
        }
    }

    if let Some(series_id) = data
        .get("partOfSeries")
        .and_then(|series| series.get("url"))
        .and_then(Value::as_str)
        .and_then(title_id)
    {
        raw.insert("seriesID".to_string(), Value::from(series_id));
    }

    if let Some(aggregate) = data.get("aggregateRating") {
        if let Some(rating) = aggregate.get("ratingValue").and_then(scalar_text) {
            raw.insert(
                "Ratings".to_string(),
                serde_json::json!([{ "Source": RATING_SOURCE, "Value": format!("{rating}/10") }]),
            );
            raw.insert("imdbRating".to_string(), Value::from(rating));
        }
        if let Some(votes) = aggregate.get("ratingCount").and_then(scalar_text) {
            raw.insert("imdbVotes".to_string(), Value::from(votes));
        }
    }

    raw
}

/// Builds a season page from episode entries, or a failure page when empty
pub(crate) fn season_page(season_index: u32, episodes: Vec<RawResponse>) -> RawResponse {
    let mut raw = RawResponse::new();
    if episodes.is_empty() {
        raw.insert(STATUS_FIELD.to_string(), Value::from(FAILURE_LITERAL));
        raw.insert("Error".to_string(), Value::from("Series or season not found!"));
        return raw;
    }

    raw.insert(STATUS_FIELD.to_string(), Value::from(SUCCESS_LITERAL));
    raw.insert("Season".to_string(), Value::from(season_index.to_string()));
    raw.insert(
        "Episodes".to_string(),
        Value::Array(episodes.into_iter().map(Value::Object).collect()),
    );
    raw
}

/// Collects the distinct episodes linked from an episode list page, in page
/// order, leaving out the series itself
///
/// Only episode links count; recommendations and other cross-links on the
/// page are ignored.
pub(crate) fn episode_ids(html: &str, series_id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RE_EPISODE_LINK
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|found| found.as_str())
        .filter(|id| *id != series_id)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Season and episode number shown on an episode's title page
pub(crate) fn episode_marker(html: &str) -> Option<EpisodeKey> {
    let captures = RE_EPISODE_MARKER.captures(html)?;
    Some(EpisodeKey::new(captures[1].parse().ok()?, captures[2].parse().ok()?))
}

fn title_id(url: &str) -> Option<&str> {
    RE_TITLE_ID.find(url).map(|found| found.as_str())
}

fn decode_html(text: &str) -> String {
    nanohtml2text::html2text(text).trim().to_string()
}

fn insert_str(raw: &mut RawResponse, field: &str, value: Option<&Value>) {
    if let Some(text) = value.and_then(scalar_text) {
        raw.insert(field.to_string(), Value::from(text));
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Names from a string, an entity, or a list of either
fn names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(name)) => vec![decode_html(name)],
        Some(Value::Object(entity)) => entity
            .get("name")
            .and_then(Value::as_str)
            .map(decode_html)
            .into_iter()
            .collect(),
        Some(Value::Array(items)) => items.iter().flat_map(|item| names(Some(item))).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SERIES_PAGE: &str = r#"<html><head>
<script type="application/ld+json">{"@context":"https://schema.org","@type":"TVSeries","url":"/title/tt1312171/","name":"The Umbrella Academy","image":"https://example.com/poster.jpg","description":"A family of former child heroes &amp; their secrets.","aggregateRating":{"@type":"AggregateRating","ratingCount":246330,"ratingValue":7.9},"contentRating":"TV-14","genre":["Action","Adventure"],"datePublished":"2019-02-15","actor":[{"@type":"Person","url":"/name/nm0000001/","name":"Elliot Page"},{"@type":"Person","url":"/name/nm0000002/","name":"Tom Hopper"}],"creator":[{"@type":"Organization","url":"/company/co0000001/"},{"@type":"Person","url":"/name/nm0000003/","name":"Steve Blackman"}]}</script>
</head><body></body></html>"#;

    fn stripped(html: &str) -> Map<String, Value> {
        match strip_at_prefixes(extract_json_ld(html).unwrap()) {
            Value::Object(map) => map,
            _ => panic!("structured data must be an object"),
        }
    }

    #[test]
    fn test_extract_json_ld() {
        let data = extract_json_ld(SERIES_PAGE).unwrap();
        assert_eq!(data["@type"], "TVSeries");
        assert!(extract_json_ld("<html></html>").is_err());
    }

    #[test]
    fn test_strip_at_prefixes_is_recursive() {
        let value = strip_at_prefixes(json!({
            "@type": "TVSeries",
            "actor": [{"@type": "Person", "name": "x"}],
            "aggregateRating": {"@type": "AggregateRating"}
        }));
        assert_eq!(
            value,
            json!({
                "type": "TVSeries",
                "actor": [{"type": "Person", "name": "x"}],
                "aggregateRating": {"type": "AggregateRating"}
            })
        );
    }

    #[test]
    fn test_to_raw_response_maps_series() {
        let raw = to_raw_response(&stripped(SERIES_PAGE), "tt1312171");

        assert_eq!(raw["Response"], "True");
        assert_eq!(raw["Type"], "series");
        assert_eq!(raw["imdbID"], "tt1312171");
        assert_eq!(raw["Title"], "The Umbrella Academy");
        assert_eq!(raw["Plot"], "A family of former child heroes & their secrets.");
        assert_eq!(raw["Genre"], "Action, Adventure");
        assert_eq!(raw["Actors"], "Elliot Page, Tom Hopper");
        assert_eq!(raw["Writer"], "Steve Blackman");
        assert_eq!(raw["imdbRating"], "7.9");
        assert_eq!(raw["imdbVotes"], "246330");
        assert_eq!(raw["Released"], "2019-02-15");
        assert_eq!(
            raw["Ratings"],
            json!([{"Source": "Internet Movie Database", "Value": "7.9/10"}])
        );
        assert!(!raw.contains_key("Director"));
    }

    #[test]
    fn test_unknown_schema_type_passes_through() {
        let data = stripped(r#"<script type="application/ld+json">{"@type":"VideoGame","name":"x"}</script>"#);
        let raw = to_raw_response(&data, "tt0000001");
        assert_eq!(raw["Type"], "VideoGame");
        assert_eq!(raw["imdbID"], "tt0000001");
    }

    #[test]
    fn test_episode_ids_are_unique_and_exclude_series() {
        let html = r#"<a href="/title/tt1312171/?ref_=ttep_ep_tt">series</a>
            <a href="/title/tt8008948/?ref_=ttep_ep_1">one</a>
            <a href="/title/tt8008948/?ref_=ttep_ep_1"><img data-const="tt8008948"></a>
            <a href="/title/tt8008950/?ref_=ttep_ep2">two</a>"#;
        assert_eq!(episode_ids(html, "tt1312171"), vec!["tt8008948", "tt8008950"]);
    }

    #[test]
    fn test_episode_ids_skip_cross_links() {
        let html = r#"<a href="/title/tt8008948/?ref_=ttep_ep_1">one</a>
            <a href="/title/tt0944947/?ref_=tt_sims_tt_i_1">More like this</a>
            <a href="/title/tt5753856/">Related</a>
            <div data-tconst="tt4574334"></div>"#;
        assert_eq!(episode_ids(html, "tt1312171"), vec!["tt8008948"]);
    }

    #[test]
    fn test_episode_marker() {
        assert_eq!(
            episode_marker(r#"<span>S1<!-- -->.<!-- -->E3</span>"#),
            Some(EpisodeKey::new(1, 3))
        );
        assert_eq!(episode_marker("<li>S2.E10</li>"), Some(EpisodeKey::new(2, 10)));
        assert_eq!(episode_marker("<p>No markers here. Each episode.</p>"), None);
    }

    #[test]
    fn test_empty_season_page_is_a_failure() {
        let raw = season_page(4, Vec::new());
        assert_eq!(raw["Response"], "False");

        let raw = season_page(1, vec![RawResponse::new()]);
        assert_eq!(raw["Response"], "True");
        assert_eq!(raw["Season"], "1");
    }
}
