//! Recursive discovery of candidate image files.
//!
//! Walks a directory tree and yields regular files that pass the extension
//! allow-list and size cap. Unreadable entries are logged and skipped; the
//! scan never fails outright.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Maximum file size eligible for compression, in bytes (~5 MB, the shrink
/// service's upload cutoff).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5_200_000;

/// Default extension allow-list.
const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Filter applied to every discovered file.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    extensions: Vec<String>,
    max_size: u64,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self::with_max_size(DEFAULT_MAX_FILE_SIZE)
    }
}

impl ScanFilter {
    /// Creates a filter with the default extensions and a custom size cap.
    #[must_use]
    pub fn with_max_size(max_size: u64) -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            max_size,
        }
    }

    /// Returns `true` if the file at `path` with the given size passes.
    ///
    /// Extension matching is case-insensitive, so `photo.PNG` is accepted.
    #[must_use]
    pub fn accepts(&self, path: &Path, size: u64) -> bool {
        if size > self.max_size {
            debug!(path = %path.display(), size, "skipping file over size cap");
            return false;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|allowed| *allowed == ext)
    }
}

/// Lazily yields candidate files under `root` that pass `filter`.
///
/// Directories are traversed depth-first in walkdir's deterministic order;
/// entries that cannot be read are logged at warn and skipped.
pub fn scan<'a>(root: &Path, filter: &'a ScanFilter) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter_map(|entry| {
            if !entry.file_type().is_file() {
                return None;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping file without metadata");
                    return None;
                }
            };
            filter
                .accepts(entry.path(), size)
                .then(|| entry.into_path())
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path, bytes: &[u8]) {
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_filter_accepts_allowed_extensions() {
        let filter = ScanFilter::default();
        assert!(filter.accepts(Path::new("a.jpg"), 100));
        assert!(filter.accepts(Path::new("a.jpeg"), 100));
        assert!(filter.accepts(Path::new("a.png"), 100));
        assert!(!filter.accepts(Path::new("a.gif"), 100));
        assert!(!filter.accepts(Path::new("a.txt"), 100));
        assert!(!filter.accepts(Path::new("noext"), 100));
    }

    #[test]
    fn test_filter_extension_is_case_insensitive() {
        let filter = ScanFilter::default();
        assert!(filter.accepts(Path::new("PHOTO.PNG"), 100));
        assert!(filter.accepts(Path::new("photo.Jpg"), 100));
    }

    #[test]
    fn test_filter_rejects_oversize_files() {
        let filter = ScanFilter::with_max_size(10);
        assert!(filter.accepts(Path::new("a.png"), 10));
        assert!(!filter.accepts(Path::new("a.png"), 11));
    }

    #[test]
    fn test_scan_recurses_and_filters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();

        touch(&root.join("top.png"), b"png");
        touch(&root.join("nested/mid.jpg"), b"jpg");
        touch(&root.join("nested/deeper/bottom.jpeg"), b"jpeg");
        touch(&root.join("nested/readme.txt"), b"not an image");
        touch(&root.join("big.png"), &vec![0u8; 32]);

        let filter = ScanFilter::with_max_size(16);
        let mut found: Vec<_> = scan(root, &filter)
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        found.sort();

        assert_eq!(found, vec![
            PathBuf::from("nested/deeper/bottom.jpeg"),
            PathBuf::from("nested/mid.jpg"),
            PathBuf::from("top.png"),
        ]);
    }

    #[test]
    fn test_scan_of_empty_directory_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let filter = ScanFilter::default();
        assert_eq!(scan(temp.path(), &filter).count(), 0);
    }
}
