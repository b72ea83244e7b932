//! Summary-only size measurement for a single directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use jwalk::WalkDir;
use spacesift_core::ScanError;
use tracing::{debug, warn};

use crate::probe;
use crate::scanner::SizeScanner;

impl SizeScanner {
    /// Total size of `path`, trying the cheapest strategy first.
    ///
    /// When `path` is the home directory, its cached subtree (`Library`) is
    /// left out so the home total never double-counts what is reported on
    /// its own. Strategies, in order: cached size, usage tool, an on-disk
    /// walk, and finally any persisted size. Successful measurements are
    /// written back to the cache.
    ///
    /// Concurrent calls for the same path share a single measurement.
    pub fn measure_overview_size(&self, path: &Path) -> Result<u64, ScanError> {
        if path.as_os_str().is_empty() {
            return Err(ScanError::InvalidPath {
                path: path.to_path_buf(),
                reason: "empty path",
            });
        }

        let path = clean_path(path);
        if !path.is_absolute() {
            return Err(ScanError::InvalidPath {
                path,
                reason: "path must be absolute",
            });
        }
        fs::metadata(&path).map_err(|e| ScanError::io(&path, e))?;

        self.overviews
            .run(&path, || self.measure_uncoalesced(&path))
            .map_err(|err| {
                err.unwrap_or_else(|| ScanError::MeasureFailed { path: path.clone() })
            })
    }

    fn measure_uncoalesced(&self, path: &Path) -> Result<u64, ScanError> {
        let exclude = if self.config.is_home(path) {
            self.config.cached_subtree_path()
        } else {
            None
        };

        if let Some(size) = self.cache.load(path).filter(|size| *size > 0) {
            return Ok(size);
        }

        let measured = match &exclude {
            Some(exclude) => self.usage.measure_excluding(path, exclude),
            None => self.usage.measure(path),
        };
        match measured {
            Ok(size) if size > 0 => return Ok(self.remember(path, size)),
            Ok(_) => debug!(path = %path.display(), "usage tool reported zero"),
            Err(err) => debug!(path = %path.display(), error = %err, "usage tool failed"),
        }

        let walked = walk_size_excluding(path, exclude.as_deref());
        if walked > 0 {
            return Ok(self.remember(path, walked));
        }

        if let Some(size) = self.cache.load_persisted(path) {
            return Ok(self.remember(path, size));
        }

        Err(ScanError::MeasureFailed {
            path: path.to_path_buf(),
        })
    }

    fn remember(&self, path: &Path, size: u64) -> u64 {
        if let Err(err) = self.cache.store(path, size) {
            warn!(path = %path.display(), error = %err, "cannot store overview size");
        }
        size
    }
}

/// Normalize `path` without touching the filesystem.
///
/// `.` components are dropped and `..` removes the preceding component.
/// A `..` at the root stays at the root; leading `..` of a relative path
/// are kept.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other),
        }
    }
    cleaned
}

/// Sum of actual file sizes under `root`, skipping the `exclude` subtree.
///
/// Symlinks are counted as themselves and never followed. Unreadable
/// entries are skipped.
pub fn walk_size_excluding(root: &Path, exclude: Option<&Path>) -> u64 {
    let exclude = exclude.map(Path::to_path_buf);

    WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .process_read_dir(move |_depth, _dir, _state, children| {
            if let Some(exclude) = &exclude {
                children.retain(|child| {
                    child
                        .as_ref()
                        .map(|c| c.path() != *exclude)
                        .unwrap_or(true)
                });
            }
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| probe::actual_size(&metadata))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn actual(path: &Path) -> u64 {
        probe::actual_size(&fs::symlink_metadata(path).unwrap())
    }

    #[test]
    fn test_clean_path_resolves_parent_components() {
        assert_eq!(clean_path(Path::new("/home/u/x/..")), PathBuf::from("/home/u"));
        assert_eq!(clean_path(Path::new("/home/./u/")), PathBuf::from("/home/u"));
        assert_eq!(clean_path(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_walk_skips_excluded_subtree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("Library/Caches")).unwrap();
        fs::create_dir_all(root.join("Documents")).unwrap();
        fs::write(root.join("Library/Caches/blob"), vec![0u8; 8192]).unwrap();
        fs::write(root.join("Documents/report.pdf"), vec![0u8; 3000]).unwrap();

        let everything = walk_size_excluding(root, None);
        let without_library = walk_size_excluding(root, Some(&root.join("Library")));

        assert_eq!(without_library, actual(&root.join("Documents/report.pdf")));
        assert_eq!(
            everything,
            without_library + actual(&root.join("Library/Caches/blob"))
        );
    }

    #[test]
    fn test_walk_missing_exclude_changes_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.bin"), vec![0u8; 2048]).unwrap();

        assert_eq!(
            walk_size_excluding(temp.path(), Some(&temp.path().join("Library"))),
            walk_size_excluding(temp.path(), None)
        );
    }
}
