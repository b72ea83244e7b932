//! On-disk size and access-time probing.

use std::fs::Metadata;
use std::time::SystemTime;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Unit of `st_blocks`, independent of the filesystem block size.
#[cfg(unix)]
const BLOCK_UNIT: u64 = 512;

/// Bytes a file actually occupies on disk.
///
/// Takes the smaller of the allocated size and the logical length, so
/// sparse and cloud-placeholder files report what they really hold and
/// block rounding never inflates small files. This is a heuristic: on
/// filesystems where allocation legitimately exceeds the logical length
/// the true footprint is under-reported.
#[cfg(unix)]
pub fn actual_size(metadata: &Metadata) -> u64 {
    let logical = metadata.len();
    let allocated = metadata.blocks().saturating_mul(BLOCK_UNIT);
    allocated.min(logical)
}

#[cfg(not(unix))]
pub fn actual_size(metadata: &Metadata) -> u64 {
    metadata.len()
}

/// Last access time, if the platform records one.
pub fn last_access(metadata: &Metadata) -> Option<SystemTime> {
    metadata.accessed().ok()
}
