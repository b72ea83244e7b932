//! Large-file discovery through a platform content index.

use std::path::{Path, PathBuf};
#[cfg(target_os = "macos")]
use std::process::Command;
use std::time::Duration;

use spacesift_core::{FileEntry, ScanConfig, ToolError};
use tracing::debug;

use crate::probe;

#[cfg(target_os = "macos")]
use crate::process::run_with_timeout;

/// Queries an index for files of at least `min_size` bytes under `root`.
pub trait IndexSearch: Send + Sync {
    /// Absolute paths of matching files, in any order.
    fn query(&self, root: &Path, min_size: u64) -> Result<Vec<PathBuf>, ToolError>;
}

/// Index that never has results; used where no content index exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl IndexSearch for NoIndex {
    fn query(&self, _root: &Path, _min_size: u64) -> Result<Vec<PathBuf>, ToolError> {
        Err(ToolError::Unavailable { tool: "index" })
    }
}

/// Spotlight (`mdfind`) wrapper.
#[derive(Debug, Clone)]
pub struct MdfindIndex {
    timeout: Duration,
}

impl MdfindIndex {
    /// Create a wrapper that gives each query at most `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Time limit applied to each query.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(target_os = "macos")]
    fn command(root: &Path, min_size: u64) -> Command {
        let mut command = Command::new("mdfind");
        command
            .arg("-onlyin")
            .arg(root)
            .arg(format!("kMDItemFSSize >= {min_size}"));
        command
    }
}

impl IndexSearch for MdfindIndex {
    #[cfg(target_os = "macos")]
    fn query(&self, root: &Path, min_size: u64) -> Result<Vec<PathBuf>, ToolError> {
        let output = run_with_timeout("mdfind", Self::command(root, min_size), self.timeout)?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    #[cfg(not(target_os = "macos"))]
    fn query(&self, _root: &Path, _min_size: u64) -> Result<Vec<PathBuf>, ToolError> {
        Err(ToolError::Unavailable { tool: "mdfind" })
    }
}

/// The index available on this platform.
pub fn platform_index(timeout: Duration) -> Box<dyn IndexSearch> {
    if cfg!(target_os = "macos") {
        Box::new(MdfindIndex::new(timeout))
    } else {
        Box::new(NoIndex)
    }
}

/// Largest files under `root` according to `index`.
///
/// Hits with a skipped extension or inside a folded directory are dropped,
/// the rest are re-sized from disk (directories, symlinks and vanished
/// paths are dropped too), sorted largest first and truncated to the
/// configured large-file count. Any failure yields an empty list.
pub fn find_large_files(
    index: &dyn IndexSearch,
    root: &Path,
    min_size: u64,
    config: &ScanConfig,
) -> Vec<FileEntry> {
    match index.query(root, min_size) {
        Ok(paths) => resolve_hits(paths, config),
        Err(err) => {
            debug!(root = %root.display(), error = %err, "content index unavailable");
            Vec::new()
        }
    }
}

fn resolve_hits(paths: Vec<PathBuf>, config: &ScanConfig) -> Vec<FileEntry> {
    let mut files: Vec<FileEntry> = paths
        .into_iter()
        .filter(|path| !config.should_skip_large_file(path))
        .filter(|path| !config.is_in_folded_dir(path))
        .filter_map(|path| {
            let metadata = std::fs::symlink_metadata(&path).ok()?;
            let file_type = metadata.file_type();
            if file_type.is_dir() || file_type.is_symlink() {
                return None;
            }
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(FileEntry::new(name, path, probe::actual_size(&metadata)))
        })
        .collect();

    files.sort_by(|a, b| b.size.cmp(&a.size));
    files.truncate(config.max_large_files);
    files
}
