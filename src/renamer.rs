//! Renaming of episode files after an assembled series
//!
//! Files are matched to episodes by the season/episode numbers in their names,
//! then renamed according to a format string. Planning never touches the disk
//! beyond listing the directory; execution never overwrites existing files.

use crate::resources::{EpisodeKey, MiniEpisode, SeriesResource};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default pattern extracting season and episode numbers from a file name
pub const DEFAULT_PATTERN: &str = r"s(?P<season>\d+)e(?P<episode>\d+)";

/// Default format of new file names; the extension is kept automatically
pub const DEFAULT_FORMAT: &str = "{show} S{season:02}E{episode:02} - {title}";

/// Errors that can occur while planning or executing renames
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid episode pattern: {0}")]
    InvalidPattern(String),
}

/// Case-insensitive pattern with `season` and `episode` capture groups
#[derive(Debug, Clone)]
pub struct EpisodePattern {
    regex: Regex,
}

impl Default for EpisodePattern {
    fn default() -> Self {
        Self {
            regex: RegexBuilder::new(DEFAULT_PATTERN)
                .case_insensitive(true)
                .build()
                .unwrap(),
        }
    }
}

impl EpisodePattern {
    pub fn new(pattern: &str) -> Result<Self, RenameError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RenameError::InvalidPattern(e.to_string()))?;

        for group in ["season", "episode"] {
            if !regex.capture_names().flatten().any(|name| name == group) {
                return Err(RenameError::InvalidPattern(format!(
                    "pattern has no '{group}' capture group"
                )));
            }
        }

        Ok(Self { regex })
    }

    /// Extracts the episode key from a file name
    pub fn extract(&self, file_name: &str) -> Option<EpisodeKey> {
        let captures = self.regex.captures(file_name)?;
        let season = captures.name("season")?.as_str().parse().ok()?;
        let episode = captures.name("episode")?.as_str().parse().ok()?;
        Some(EpisodeKey::new(season, episode))
    }
}

/// What will happen to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameAction {
    /// The file gets a new name
    Rename {
        destination: PathBuf,
        /// Duplicate suffix applied (if any)
        duplicate_suffix: Option<usize>,
    },
    /// The file already has its target name
    AlreadyNamed,
    /// The name has episode numbers the series doesn't have
    UnknownEpisode(EpisodeKey),
    /// No episode numbers could be found in the name
    NoEpisodeKey,
}

/// A planned operation for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRename {
    pub source: PathBuf,
    pub key: Option<EpisodeKey>,
    pub action: RenameAction,
}

impl PlannedRename {
    pub fn destination(&self) -> Option<&Path> {
        match &self.action {
            RenameAction::Rename { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

/// A rename that could not be carried out
#[derive(Debug)]
pub struct RenameFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub error: io::Error,
}

/// Outcome of executing a plan
#[derive(Debug, Default)]
pub struct RenameReport {
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub failures: Vec<RenameFailure>,
}

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    // Trim whitespace and dots from start/end
    sanitized.trim_matches(|c: char| c.is_whitespace() || c == '.').to_string()
}

/// Formats a file name for an episode
///
/// Supported placeholders:
/// - `{show}` - Series title
/// - `{season}` or `{season:NN}` - Season number with optional zero-padding
/// - `{episode}` or `{episode:NN}` - Episode number with optional zero-padding
/// - `{title}` - Episode title
/// - `{id}` - Episode catalog identifier
/// - `{ext}` - File extension (without dot)
///
/// Without an `{ext}` placeholder the extension is appended.
pub fn format_filename(format: &str, show: &str, episode: &MiniEpisode, extension: &str) -> String {
    let mut result = format.replace("{show}", &sanitize_filename(show));
    result = replace_with_padding(&result, "season", episode.season_index);
    result = replace_with_padding(&result, "episode", episode.index_in_season);
    result = result.replace("{title}", &sanitize_filename(&episode.title));
    result = result.replace("{id}", &episode.imdb_id);

    if result.contains("{ext}") {
        result = result.replace("{ext}", extension);
    } else {
        result = sanitize_filename(&result);
        if !extension.is_empty() {
            result = format!("{result}.{extension}");
        }
    }
    result
}

/// Helper function to replace placeholders with optional zero-padding
///
/// Handles both `{name}` and `{name:NN}` where NN is the padding width
fn replace_with_padding(text: &str, name: &str, value: u32) -> String {
    let mut result = text.to_string();

    // First, handle padded versions like {season:02}
    let pattern_start = format!("{{{name}:");
    let mut search_from = 0;
    while let Some(offset) = result[search_from..].find(&pattern_start) {
        let start = search_from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let full_pattern = result[start..start + end + 1].to_string();
        let padding_str = &full_pattern[pattern_start.len()..full_pattern.len() - 1];

        match padding_str.parse::<usize>() {
            Ok(width) => {
                let formatted = format!("{value:0width$}");
                result.replace_range(start..start + end + 1, &formatted);
                search_from = start + formatted.len();
            }
            // Leave malformed placeholders as they are
            Err(_) => search_from = start + full_pattern.len(),
        }
    }

    // Then handle unpadded version like {season}
    let simple_pattern = format!("{{{name}}}");
    result.replace(&simple_pattern, &value.to_string())
}

/// Lists the regular files of a directory, sorted by name
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, RenameError> {
    if !dir.is_dir() {
        return Err(RenameError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Plans renames for files against an assembled series
///
/// For duplicate destinations, adds numeric suffix starting from 2:
/// - First occurrence: `name.ext`
/// - Second occurrence: `name (2).ext`
pub fn plan_renames(
    files: &[PathBuf],
    series: &SeriesResource,
    pattern: &EpisodePattern,
    format: &str,
) -> Vec<PlannedRename> {
    let mut occurrences: HashMap<PathBuf, usize> = HashMap::new();

    files
        .iter()
        .map(|source| {
            let file_name = source.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let Some(key) = pattern.extract(file_name) else {
                return PlannedRename {
                    source: source.clone(),
                    key: None,
                    action: RenameAction::NoEpisodeKey,
                };
            };

            let Some(episode) = series.episode(key) else {
                tracing::warn!(file = %source.display(), episode = %key, "episode not found in series");
                return PlannedRename {
                    source: source.clone(),
                    key: Some(key),
                    action: RenameAction::UnknownEpisode(key),
                };
            };

            let extension = source.extension().and_then(|e| e.to_str()).unwrap_or_default();
            let base_name = format_filename(format, &series.details.title, episode, extension);
            let parent = source.parent().unwrap_or_else(|| Path::new(""));

            let occurrence = occurrences.entry(parent.join(&base_name)).or_insert(0);
            *occurrence += 1;
            let (final_name, duplicate_suffix) = if *occurrence == 1 {
                (base_name, None)
            } else {
                (with_suffix(&base_name, extension, *occurrence), Some(*occurrence))
            };

            let destination = parent.join(final_name);
            let action = if destination == *source {
                RenameAction::AlreadyNamed
            } else {
                RenameAction::Rename {
                    destination,
                    duplicate_suffix,
                }
            };

            PlannedRename {
                source: source.clone(),
                key: Some(key),
                action,
            }
        })
        .collect()
}

fn with_suffix(name: &str, extension: &str, number: usize) -> String {
    match name.strip_suffix(&format!(".{extension}")) {
        Some(stem) if !extension.is_empty() => format!("{stem} ({number}).{extension}"),
        _ => format!("{name} ({number})"),
    }
}

/// Executes planned renames in place
///
/// Existing files are never overwritten; such renames are reported as
/// failures along with any IO errors.
pub fn execute_renames(plans: &[PlannedRename]) -> RenameReport {
    let mut report = RenameReport::default();

    for plan in plans {
        let Some(destination) = plan.destination() else {
            continue;
        };

        let result = if destination.exists() {
            Err(io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"))
        } else {
            fs::rename(&plan.source, destination)
        };

        match result {
            Ok(()) => {
                tracing::info!(from = %plan.source.display(), to = %destination.display(), "renamed");
                report.renamed.push((plan.source.clone(), destination.to_path_buf()));
            }
            Err(error) => report.failures.push(RenameFailure {
                source: plan.source.clone(),
                destination: destination.to_path_buf(),
                error,
            }),
        }
    }

    report
}

/// Writes one `source -> destination` line per completed rename
pub fn write_rename_log(path: &Path, renamed: &[(PathBuf, PathBuf)]) -> Result<(), RenameError> {
    let mut content = String::new();
    for (source, destination) in renamed {
        // Writing to a String cannot fail
        let _ = writeln!(content, "{} -> {}", source.display(), destination.display());
    }
    fs::write(path, content)?;
    Ok(())
}
