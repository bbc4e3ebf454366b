//! On-disk storage for catalog responses
//!
//! Every entry is one pretty-printed JSON file inside a per-source directory
//! below the platform cache directory. Entries older than the storage's
//! time-to-live are treated as absent and removed when they are next read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Application identity used to locate platform directories
pub(crate) const APP_QUALIFIER: &str = "org";
pub(crate) const APP_ORGANIZATION: &str = "season-scout";
pub(crate) const APP_NAME: &str = "season-scout";

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CacheError {
    /// The platform has no home or cache directory
    #[error("No cache directory available on this platform")]
    CacheDirectoryNotFound,

    #[error("Cannot create cache directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("Cannot read cache entry {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("Cannot write cache entry {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// The entry exists but doesn't hold a value of the stored type
    #[error("Corrupt cache entry {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cannot encode cache entry: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Directory of JSON entries of one type, with an optional time-to-live
pub struct CacheStorage<T> {
    cache_dir: PathBuf,
    ttl: Option<Duration>,
    _entry: PhantomData<T>,
}

impl<T> CacheStorage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Opens a storage in an explicit directory, creating it when needed
    pub fn open_at(cache_dir: &Path, ttl: Option<Duration>) -> Result<Self, CacheError> {
        fs::create_dir_all(cache_dir).map_err(|source| CacheError::DirectoryCreationFailed {
            path: cache_dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            ttl,
            _entry: PhantomData,
        })
    }

    /// Platform location of the storage `name`
    ///
    /// `name` is lowercased and anything outside `[a-z0-9-]` becomes `_`, so
    /// `"OMDb API"` ends up in `omdb_api/`.
    pub fn default_dir(name: &str) -> Result<PathBuf, CacheError> {
        directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.cache_dir().join(sanitize_name(name)))
            .ok_or(CacheError::CacheDirectoryNotFound)
    }

    /// Returns the entry for `key`, or `None` when it is absent or expired
    ///
    /// An entry that exists but cannot be decoded is an error; callers decide
    /// whether to fall back to a fresh request.
    pub fn load(&self, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.entry_path(key);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::ReadFailed { path, source }),
        };

        if let Some(ttl) = self.ttl {
            // Entries with a modification time in the future count as fresh
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age > ttl);
            if expired {
                tracing::debug!(path = %path.display(), "dropping expired cache entry");
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove expired cache entry");
                }
                return Ok(None);
            }
        }

        let content = fs::read_to_string(&path).map_err(|source| CacheError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CacheError::DeserializationFailed { path, source })
    }

    /// Writes the entry for `key`
    ///
    /// The value goes to a sibling temporary file first and is then renamed
    /// over the entry, so readers never observe a half-written file.
    pub fn store(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let staging = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(value)?;

        fs::write(&staging, content)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| CacheError::WriteFailed { path, source })
    }

    /// Removes every entry and returns how many were deleted
    pub fn clear(&self) -> Result<usize, CacheError> {
        let read_error = |source| CacheError::ReadFailed {
            path: self.cache_dir.clone(),
            source,
        };

        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                fs::remove_file(&path).map_err(|source| CacheError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(sanitize_name(key))
            .with_extension(ENTRY_EXTENSION)
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-') => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("season_scout_cache_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("omdb"), "omdb");
        assert_eq!(sanitize_name("OMDb API"), "omdb_api");
        assert_eq!(sanitize_name("season-scout"), "season-scout");
        assert_eq!(sanitize_name("media:id:tt0325980"), "media_id_tt0325980");
    }

    #[test]
    fn test_default_dir_is_named_after_the_source() {
        // Platforms without a home directory have no cache location at all
        if let Ok(dir) = CacheStorage::<u32>::default_dir("OMDb API") {
            assert!(dir.ends_with("omdb_api"));
        }
    }

    #[test]
    fn test_store_and_load() {
        let dir = scratch_dir("store");
        let cache: CacheStorage<Vec<u32>> = CacheStorage::open_at(&dir, None).unwrap();

        assert_eq!(cache.load("missing").unwrap(), None);
        cache.store("Some Key", &vec![1, 2, 3]).unwrap();
        assert_eq!(cache.load("Some Key").unwrap(), Some(vec![1, 2, 3]));
        assert!(dir.join("some_key.json").exists());
        assert!(!dir.join("some_key.tmp").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_expired_entries_are_absent_and_removed() {
        let dir = scratch_dir("ttl");
        let cache: CacheStorage<String> = CacheStorage::open_at(&dir, Some(Duration::ZERO)).unwrap();

        cache.store("key", &"value".to_string()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.load("key").unwrap(), None);
        assert!(!dir.join("key.json").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let dir = scratch_dir("corrupt");
        let cache: CacheStorage<String> = CacheStorage::open_at(&dir, None).unwrap();

        fs::write(dir.join("key.json"), "not json").unwrap();
        assert!(matches!(
            cache.load("key"),
            Err(CacheError::DeserializationFailed { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_clear_removes_entries_only() {
        let dir = scratch_dir("clear");
        let cache: CacheStorage<u32> = CacheStorage::open_at(&dir, None).unwrap();

        cache.store("a", &1).unwrap();
        cache.store("b", &2).unwrap();
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.load("a").unwrap(), None);
        assert!(dir.join("notes.txt").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
