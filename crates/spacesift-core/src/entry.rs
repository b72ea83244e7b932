//! Scan candidate types.

use std::path::PathBuf;
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Anything that can be ranked by its on-disk size.
pub trait Measured {
    /// Size in bytes used for ranking.
    fn size(&self) -> u64;
}

/// One immediate child of the scanned root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Display name. Symlinks carry a trailing arrow.
    pub name: CompactString,
    /// Full path.
    pub path: PathBuf,
    /// Actual on-disk size in bytes (aggregate for directories).
    pub size: u64,
    /// Whether the entry is (or points at) a directory.
    pub is_dir: bool,
    /// Last access time, if the platform reports one.
    pub last_access: Option<SystemTime>,
}

impl DirEntry {
    /// Suffix appended to the names of symlink entries.
    pub const LINK_MARKER: &'static str = " →";

    /// Create an entry for a directory subtree.
    pub fn directory(name: impl Into<CompactString>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            is_dir: true,
            last_access: None,
        }
    }

    /// Attach a last access time.
    pub fn with_last_access(mut self, last_access: Option<SystemTime>) -> Self {
        self.last_access = last_access;
        self
    }

    /// Create an entry for a plain file.
    pub fn file(
        name: impl Into<CompactString>,
        path: impl Into<PathBuf>,
        size: u64,
        last_access: Option<SystemTime>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            is_dir: false,
            last_access,
        }
    }

    /// Create an entry for a symlink. Only the link itself is sized.
    pub fn link(
        name: &str,
        path: impl Into<PathBuf>,
        size: u64,
        target_is_dir: bool,
        last_access: Option<SystemTime>,
    ) -> Self {
        let mut display = CompactString::new(name);
        display.push_str(Self::LINK_MARKER);
        Self {
            name: display,
            path: path.into(),
            size,
            is_dir: target_is_dir,
            last_access,
        }
    }

    /// Check if this entry was created for a symlink.
    pub fn is_link(&self) -> bool {
        self.name.ends_with(Self::LINK_MARKER)
    }
}

impl Measured for DirEntry {
    fn size(&self) -> u64 {
        self.size
    }
}

/// A file large enough to be reported on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name (not full path).
    pub name: CompactString,
    /// Full path.
    pub path: PathBuf,
    /// Actual on-disk size in bytes.
    pub size: u64,
}

impl FileEntry {
    /// Create a new large-file candidate.
    pub fn new(name: impl Into<CompactString>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
        }
    }
}

impl Measured for FileEntry {
    fn size(&self) -> u64 {
        self.size
    }
}
