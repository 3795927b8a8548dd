//! Content-addressed dedup cache for already-compressed files.
//!
//! The cache is a persisted set of content fingerprints. Identity is purely
//! content-based: a file that was moved, renamed, or copied is still
//! recognized as already processed because its bytes hash to the same
//! [`Fingerprint`].
//!
//! # Lifecycle
//!
//! - [`ContentCache::load`] reads the backing file once at startup. A
//!   missing or corrupt file yields an empty cache, never an error - the
//!   worst case is reprocessing everything.
//! - [`ContentCache::record`] inserts fingerprints as tasks complete.
//! - [`ContentCache::persist`] writes a full, duplicate-free snapshot at
//!   checkpoints. A persist failure is the one fatal cache condition: if it
//!   were swallowed, all in-run progress would be invisible to future runs.
//!
//! Entries are never evicted; the set only grows across runs.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while persisting the cache.
///
/// Load-side failures are deliberately not represented here; they are
/// recovered locally by starting from an empty set.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to write the backing file.
    #[error("failed to write cache file {path}: {source}")]
    Io {
        /// The cache file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Failed to serialize the fingerprint set.
    #[error("failed to serialize cache: {source}")]
    Serialize {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Creates an IO error with the cache file path for context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A 128-bit content digest identifying a file's bytes, stored as lowercase hex.
///
/// Two files with identical bytes produce the same fingerprint regardless of
/// path or name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a byte slice.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Md5::digest(bytes);
        Self(format!("{digest:x}"))
    }

    /// Returns the hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted set of fingerprints for files that have already been compressed.
#[derive(Debug)]
pub struct ContentCache {
    /// Backing file path used by [`ContentCache::persist`].
    path: PathBuf,
    /// In-memory fingerprint set. Set semantics collapse duplicates on
    /// insert, so the persisted form never contains duplicate entries.
    entries: HashSet<Fingerprint>,
}

impl ContentCache {
    /// Loads the cache from `path`, or starts empty if the file is missing
    /// or unreadable.
    ///
    /// The on-disk format is a JSON array of hex fingerprint strings.
    /// Duplicate entries (from older or hand-edited files) are tolerated and
    /// collapse into the set on load.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Vec<Fingerprint>>(&text) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "cache file is corrupt, starting with empty cache"
                    );
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache file, starting with empty cache");
                HashSet::new()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "cache file is unreadable, starting with empty cache"
                );
                HashSet::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "cache loaded");
        Self { path, entries }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Membership test: has a file with this content already been compressed?
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains(fingerprint)
    }

    /// Records a fingerprint as processed.
    ///
    /// Idempotent: recording an already-present fingerprint is a no-op.
    /// Returns `true` if the fingerprint was newly inserted.
    pub fn record(&mut self, fingerprint: Fingerprint) -> bool {
        self.entries.insert(fingerprint)
    }

    /// Returns the number of recorded fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no fingerprints are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes a full snapshot of the set to the backing file, replacing any
    /// previous contents.
    ///
    /// The output is a sorted JSON array, so repeated persists of the same
    /// set are byte-identical. Safe to call any number of times within a run;
    /// it never loses previously recorded entries because it always writes
    /// the complete current state.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if serialization or the write fails. Callers
    /// should treat this as fatal: a silently lost snapshot means every file
    /// compressed this run gets reprocessed next run.
    pub fn persist(&self) -> Result<(), CacheError> {
        let mut list: Vec<&Fingerprint> = self.entries.iter().collect();
        list.sort();

        let json = serde_json::to_string_pretty(&list)
            .map_err(|source| CacheError::Serialize { source })?;
        fs::write(&self.path, json).map_err(|e| CacheError::io(&self.path, e))?;

        debug!(path = %self.path.display(), entries = list.len(), "cache persisted");
        Ok(())
    }
}
