//! Per-video playback bookmarks persisted as a single JSON blob.
//!
//! The whole mapping is read and written at once. Failures never reach the
//! caller through [`BookmarkFile::load`] / [`BookmarkFile::save`]: a broken
//! or missing file reads as "no bookmarks yet" and a failed write leaves the
//! caller's in-memory mapping as the only copy until the next save.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("failed to read bookmarks from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed bookmarks file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write bookmarks to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize bookmarks: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(alias = "titulo", default, deserialize_with = "deserialize_title")]
    pub title: String,
    #[serde(rename = "position", deserialize_with = "deserialize_position")]
    pub position_ms: u64,
}

/// Video id to bookmark. Ordered so the persisted blob is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkStore {
    entries: BTreeMap<String, Bookmark>,
}

impl BookmarkStore {
    pub fn get(&self, video_id: &str) -> Option<&Bookmark> {
        self.entries.get(video_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bookmark)> {
        self.entries.iter().map(|(id, bookmark)| (id.as_str(), bookmark))
    }
}

/// Returns a copy of `store` with the entry for `video_id` replaced.
///
/// Negative positions are stored as 0.
pub fn upsert(
    store: &BookmarkStore,
    video_id: &str,
    title: &str,
    position_ms: i64,
) -> BookmarkStore {
    let mut next = store.clone();
    next.entries.insert(
        video_id.to_string(),
        Bookmark {
            title: title.to_string(),
            position_ms: position_ms.max(0) as u64,
        },
    );
    next
}

/// The file backing a [`BookmarkStore`].
#[derive(Debug, Clone)]
pub struct BookmarkFile {
    path: PathBuf,
}

impl BookmarkFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BookmarkStore {
        match self.try_load() {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "Bookmarks unavailable, starting with none");
                BookmarkStore::default()
            }
        }
    }

    pub fn try_load(&self) -> Result<BookmarkStore, BookmarkError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No bookmarks file yet");
                return Ok(BookmarkStore::default());
            }
            Err(source) => {
                return Err(BookmarkError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let raw_entries: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|source| BookmarkError::Parse {
                path: self.path.clone(),
                source,
            })?;

        // One unreadable entry must not cost the others their bookmarks.
        let mut entries = BTreeMap::new();
        for (video_id, value) in raw_entries {
            match serde_json::from_value::<Bookmark>(value) {
                Ok(bookmark) => {
                    entries.insert(video_id, bookmark);
                }
                Err(err) => {
                    warn!(video_id = %video_id, error = %err, "Skipping unreadable bookmark");
                }
            }
        }
        let store = BookmarkStore { entries };
        debug!(count = store.len(), "Loaded bookmarks");
        Ok(store)
    }

    pub fn save(&self, store: &BookmarkStore) {
        if let Err(err) = self.try_save(store) {
            error!(error = %err, "Bookmark not saved");
        }
    }

    /// Writes `store` to a sibling temp file and renames it over the target,
    /// so readers see either the previous blob or the new one.
    pub fn try_save(&self, store: &BookmarkStore) -> Result<(), BookmarkError> {
        let json = serde_json::to_string(store)?;
        let write_err = |source: io::Error| BookmarkError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let temp_path = self.temp_path();
        std::fs::write(&temp_path, json.as_bytes()).map_err(write_err)?;
        if let Err(source) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_err(source));
        }

        debug!(count = store.len(), path = %self.path.display(), "Saved bookmarks");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn deserialize_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Older blobs hold positions computed as `fraction * duration`, so accept
// any JSON number and normalize it to whole, non-negative milliseconds.
fn deserialize_position<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value <= 0.0 {
        return Ok(0);
    }
    Ok(value.round() as u64)
}
