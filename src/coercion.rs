//! Value coercion for string-typed catalog fields
//!
//! Catalog responses carry numbers, dates, durations and lists as free text,
//! with a literal missing-marker (usually `"N/A"`) standing in for absent values.
//! Every function here takes the raw text together with that marker and returns
//! a typed value. Parse failures are absorbed into the documented sentinel and
//! never surface as errors.

use chrono::{DateTime, NaiveDate, TimeDelta};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// The missing-marker used by the OMDb API
pub const DEFAULT_MISSING_MARKER: &str = "N/A";

/// Date layouts seen in catalog responses, tried in order
const DATE_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%b %d, %Y", "%B %d, %Y"];

static RE_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(\d+)\s*h(?:ours?|rs?)?\s*)?(?:(\d+)\s*min(?:utes?|s)?)?$").unwrap()
});
static RE_ISO_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .unwrap()
});
static RE_YEAR_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{4})(?:\D+(\d{4}))?").unwrap());

/// A numeric field after coercion
///
/// `NotANumber` is the sentinel for missing or unparsable input. It converts to
/// `f64::NAN`, so it never compares equal to zero and drops out of aggregates
/// that skip NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    /// Text without a decimal point
    Integer(i64),
    /// Text with a decimal point
    Float(f64),
    /// Missing-marker or unparsable text
    NotANumber,
}

impl Number {
    /// Returns the value as a float, mapping the sentinel to NaN
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(value) => value as f64,
            Number::Float(value) => value,
            Number::NotANumber => f64::NAN,
        }
    }

    /// Returns the value as an integer if it is whole
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Integer(value) => Some(value),
            Number::Float(value) if value.fract() == 0.0 => Some(value as i64),
            _ => None,
        }
    }

    /// Returns the value as a non-negative 32-bit integer if it fits
    pub fn as_u32(self) -> Option<u32> {
        self.as_i64().and_then(|value| u32::try_from(value).ok())
    }

    /// Returns the value as a non-negative 64-bit integer if it fits
    pub fn as_u64(self) -> Option<u64> {
        self.as_i64().and_then(|value| u64::try_from(value).ok())
    }
}

impl fmt::Display for Number {
    /// Renders source-style text; floats always keep their decimal point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(value) => write!(f, "{value}"),
            Number::Float(value) => write!(f, "{value:?}"),
            Number::NotANumber => f.write_str(DEFAULT_MISSING_MARKER),
        }
    }
}

/// A running time normalized to whole minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Runtime {
    minutes: u32,
}

impl Runtime {
    pub fn from_minutes(minutes: u32) -> Self {
        Self { minutes }
    }

    pub fn minutes(self) -> u32 {
        self.minutes
    }

    /// Returns the runtime as a chrono time span
    pub fn as_time_delta(self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.minutes))
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes)
    }
}

/// First and (optionally) last year of a release span, e.g. `2018–2020`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YearSpan {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl fmt::Display for YearSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => write!(f, "{start}–{end}"),
            (Some(start), None) => write!(f, "{start}–"),
            _ => f.write_str(DEFAULT_MISSING_MARKER),
        }
    }
}

/// Letter case applied to list elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LetterCase {
    #[default]
    Preserve,
    Lower,
}

fn is_missing(text: &str, missing: &str) -> bool {
    text.is_empty() || text == missing.trim()
}

/// Coerces a numeric field
///
/// Thousands separators are stripped. Text containing a decimal point parses
/// as a float, anything else as an integer. The missing-marker and unparsable
/// text both yield [`Number::NotANumber`].
pub fn parse_number(raw: &str, missing: &str) -> Number {
    let text = raw.trim();
    if is_missing(text, missing) {
        return Number::NotANumber;
    }

    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    if cleaned.contains('.') {
        match cleaned.parse::<f64>() {
            Ok(value) if value.is_finite() => Number::Float(value),
            _ => Number::NotANumber,
        }
    } else {
        cleaned
            .parse::<i64>()
            .map(Number::Integer)
            .unwrap_or(Number::NotANumber)
    }
}

/// Coerces a currency amount such as `"$305,343,252"`
///
/// Leading currency symbols are skipped. Returns `None` for the missing-marker
/// or anything that isn't a non-negative whole amount.
pub fn parse_currency(raw: &str, missing: &str) -> Option<u64> {
    let text = raw.trim();
    if is_missing(text, missing) {
        return None;
    }

    let amount = text.trim_start_matches(|c: char| !c.is_ascii_digit());
    parse_number(amount, missing).as_u64()
}

/// Coerces a calendar date
///
/// Returns `None` for the missing-marker. Unparsable text is logged and also
/// yields `None`, because upstream data is occasionally malformed.
pub fn parse_date(raw: &str, missing: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if is_missing(text, missing) {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }

    tracing::warn!(value = text, "could not parse date, treating it as missing");
    None
}

/// Coerces a running time
///
/// Accepts `"143 min"`, `"1 h 30 min"` or an ISO-8601 period such as `"PT2H1M"`.
/// Seconds are dropped, not rounded. Returns `None` for the missing-marker and
/// (after logging) for unparsable text.
pub fn parse_duration(raw: &str, missing: &str) -> Option<Runtime> {
    let text = raw.trim();
    if is_missing(text, missing) {
        return None;
    }

    let minutes = minutes_from_text(text).or_else(|| minutes_from_iso_period(text));
    if minutes.is_none() {
        tracing::warn!(value = text, "could not parse duration, treating it as missing");
    }
    minutes.map(Runtime::from_minutes)
}

fn capture_u32(captures: &Captures<'_>, index: usize) -> Option<u32> {
    captures.get(index)?.as_str().parse().ok()
}

fn minutes_from_text(text: &str) -> Option<u32> {
    let captures = RE_MINUTES.captures(text)?;
    let hours = capture_u32(&captures, 1);
    let minutes = capture_u32(&captures, 2);
    if hours.is_none() && minutes.is_none() {
        return None;
    }

    hours
        .unwrap_or(0)
        .checked_mul(60)?
        .checked_add(minutes.unwrap_or(0))
}

fn minutes_from_iso_period(text: &str) -> Option<u32> {
    let captures = RE_ISO_PERIOD.captures(text)?;
    if (1..=5).all(|index| captures.get(index).is_none()) {
        return None;
    }

    let weeks = capture_u32(&captures, 1).unwrap_or(0);
    let days = capture_u32(&captures, 2).unwrap_or(0);
    let hours = capture_u32(&captures, 3).unwrap_or(0);
    let minutes = capture_u32(&captures, 4).unwrap_or(0);

    let total_days = weeks.checked_mul(7)?.checked_add(days)?;
    let total_hours = total_days.checked_mul(24)?.checked_add(hours)?;
    total_hours.checked_mul(60)?.checked_add(minutes)
}

/// Coerces a comma-joined list, preserving source order and letter case
pub fn parse_list(raw: &str, missing: &str) -> Vec<String> {
    parse_list_with(raw, missing, ',', LetterCase::Preserve)
}

/// Coerces a delimiter-joined list
///
/// Elements are trimmed. Empty elements and elements equal to the missing-marker
/// are dropped, so a field that is entirely the marker becomes an empty list.
pub fn parse_list_with(raw: &str, missing: &str, delimiter: char, case: LetterCase) -> Vec<String> {
    let missing = missing.trim();
    raw.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty() && *item != missing)
        .map(|item| match case {
            LetterCase::Preserve => item.to_string(),
            LetterCase::Lower => item.to_lowercase(),
        })
        .collect()
}

/// Coerces a release year or year span such as `"2018–"` or `"2008–2013"`
pub fn parse_year_span(raw: &str, missing: &str) -> YearSpan {
    let text = raw.trim();
    if is_missing(text, missing) {
        return YearSpan::default();
    }

    match RE_YEAR_SPAN.captures(text) {
        Some(captures) => YearSpan {
            start: captures.get(1).and_then(|m| m.as_str().parse().ok()),
            end: captures.get(2).and_then(|m| m.as_str().parse().ok()),
        },
        None => YearSpan::default(),
    }
}

/// Serde adapter that writes NaN sentinels as `null` and reads `null` back as NaN
///
/// JSON has no NaN, and serde_json would otherwise emit `null` that cannot be
/// read back into an `f64`.
pub(crate) mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NA: &str = DEFAULT_MISSING_MARKER;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("7.8", NA), Number::Float(7.8));
        assert_eq!(parse_number("39,297", NA), Number::Integer(39297));
        assert_eq!(parse_number(" 2 ", NA), Number::Integer(2));
        assert_eq!(parse_number("-3", NA), Number::Integer(-3));
        assert_eq!(parse_number("N/A", NA), Number::NotANumber);
        assert_eq!(parse_number("", NA), Number::NotANumber);
        assert_eq!(parse_number("abc", NA), Number::NotANumber);
        assert_eq!(parse_number("1.2.3", NA), Number::NotANumber);
    }

    #[test]
    fn test_not_a_number_is_not_zero() {
        let sentinel = parse_number("N/A", NA).as_f64();
        assert!(sentinel.is_nan());
        assert!(sentinel != 0.0);
        assert!(!(sentinel < 0.0) && !(sentinel > 0.0));
        assert_eq!(parse_number("N/A", NA).as_i64(), None);
    }

    #[test]
    fn test_number_round_trip() {
        for raw in ["7.8", "8.0", "39,297", "0", "-3", "10.25", "N/A"] {
            let first = parse_number(raw, NA);
            let second = parse_number(&first.to_string(), NA);
            assert_eq!(first, second, "round trip of {raw}");
        }
    }

    #[test]
    fn test_custom_missing_marker() {
        assert_eq!(parse_number("-", "-"), Number::NotANumber);
        assert_eq!(parse_date("unknown", "unknown"), None);
        assert_eq!(parse_duration("?", "?"), None);
        assert!(parse_list("none", "none").is_empty());
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("$305,343,252", NA), Some(305_343_252));
        assert_eq!(parse_currency("€1,000", NA), Some(1000));
        assert_eq!(parse_currency("N/A", NA), None);
        assert_eq!(parse_currency("$", NA), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2018, 10, 26);
        assert_eq!(parse_date("26 Oct 2018", NA), expected);
        assert_eq!(parse_date("2018-10-26", NA), expected);
        assert_eq!(parse_date("26 October 2018", NA), expected);
        assert_eq!(parse_date("2013-10-13T13:57:04Z", NA), NaiveDate::from_ymd_opt(2013, 10, 13));
    }

    #[test]
    fn test_parse_date_missing_and_malformed() {
        assert_eq!(parse_date("N/A", NA), None);
        assert_eq!(parse_date("sometime in 2018", NA), None);
        assert_eq!(parse_date("31 Feb 2018", NA), None);
    }

    #[test]
    fn test_date_round_trip() {
        for raw in ["26 Oct 2018", "2003-07-09", "02 Dec 2003"] {
            let first = parse_date(raw, NA).unwrap();
            let formatted = first.format("%d %b %Y").to_string();
            assert_eq!(parse_date(&formatted, NA), Some(first));
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("143 min", NA), Some(Runtime::from_minutes(143)));
        assert_eq!(parse_duration("1 h 30 min", NA), Some(Runtime::from_minutes(90)));
        assert_eq!(parse_duration("PT2H1M", NA), Some(Runtime::from_minutes(121)));
        assert_eq!(parse_duration("PT42M", NA), Some(Runtime::from_minutes(42)));
        assert_eq!(parse_duration("P1DT1H", NA), Some(Runtime::from_minutes(1500)));
        assert_eq!(parse_duration("N/A", NA), None);
        assert_eq!(parse_duration("PT", NA), None);
        assert_eq!(parse_duration("long", NA), None);
    }

    #[test]
    fn test_duration_drops_seconds() {
        assert_eq!(parse_duration("PT1H32M59S", NA), Some(Runtime::from_minutes(92)));
        assert_eq!(parse_duration("PT30S", NA), Some(Runtime::from_minutes(0)));
    }

    #[test]
    fn test_duration_round_trip() {
        for raw in ["60 min", "PT2H1M", "143 min"] {
            let first = parse_duration(raw, NA).unwrap();
            assert_eq!(parse_duration(&first.to_string(), NA), Some(first));
        }
        assert_eq!(Runtime::from_minutes(121).as_time_delta(), TimeDelta::minutes(121));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("Drama, Fantasy, Horror", NA),
            vec!["Drama", "Fantasy", "Horror"]
        );
        assert_eq!(parse_list("a,b , c", NA), vec!["a", "b", "c"]);
        assert_eq!(parse_list("English, N/A", NA), vec!["English"]);
        assert!(parse_list("N/A", NA).is_empty());
        assert!(parse_list("", NA).is_empty());
    }

    #[test]
    fn test_parse_list_lowercase() {
        assert_eq!(
            parse_list_with("Rebellion;Space Opera", NA, ';', LetterCase::Lower),
            vec!["rebellion", "space opera"]
        );
    }

    #[test]
    fn test_parse_year_span() {
        assert_eq!(
            parse_year_span("2018–", NA),
            YearSpan { start: Some(2018), end: None }
        );
        assert_eq!(
            parse_year_span("2008–2013", NA),
            YearSpan { start: Some(2008), end: Some(2013) }
        );
        assert_eq!(
            parse_year_span("2003", NA),
            YearSpan { start: Some(2003), end: None }
        );
        assert_eq!(parse_year_span("N/A", NA), YearSpan::default());
    }

    #[test]
    fn test_nan_as_null_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Rated {
            #[serde(with = "nan_as_null")]
            rating: f64,
        }

        let json = serde_json::to_string(&Rated { rating: f64::NAN }).unwrap();
        assert_eq!(json, r#"{"rating":null}"#);
        let back: Rated = serde_json::from_str(&json).unwrap();
        assert!(back.rating.is_nan());

        let back: Rated = serde_json::from_str(r#"{"rating":7.5}"#).unwrap();
        assert_eq!(back.rating, 7.5);
    }
}
