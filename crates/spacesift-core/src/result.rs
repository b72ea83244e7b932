//! Scan result container.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entry::{DirEntry, FileEntry};

/// Outcome of scanning one root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Root path that was scanned.
    pub root: PathBuf,

    /// Largest immediate children, sorted by size descending.
    pub entries: Vec<DirEntry>,

    /// Largest files anywhere below the root, sorted by size descending.
    pub large_files: Vec<FileEntry>,

    /// Actual on-disk bytes of everything visited.
    pub total_size: u64,

    /// Files (and symlinks) sized during the scan.
    pub files_scanned: u64,

    /// Directories sized during the scan.
    pub dirs_scanned: u64,

    /// Duration of the scan.
    pub scan_duration: Duration,
}

impl ScanResult {
    /// Result for a root with nothing in it.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
            large_files: Vec::new(),
            total_size: 0,
            files_scanned: 0,
            dirs_scanned: 0,
            scan_duration: Duration::ZERO,
        }
    }

    /// Check if the scan found nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.large_files.is_empty() && self.total_size == 0
    }

    /// Largest immediate child, if any.
    pub fn largest_entry(&self) -> Option<&DirEntry> {
        self.entries.first()
    }
}
