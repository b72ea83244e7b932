//! Overview size caches.
//!
//! The engine only ever asks a cache for a previously measured size and
//! hands back fresh measurements. Freshness policy belongs to the cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use spacesift_core::ScanError;
use tracing::warn;

/// Store of previously measured subtree sizes.
pub trait OverviewSizeCache: Send + Sync {
    /// A fresh size for `path`, if one is known.
    fn load(&self, path: &Path) -> Option<u64>;

    /// Any size ever persisted for `path`, regardless of age.
    fn load_persisted(&self, _path: &Path) -> Option<u64> {
        None
    }

    /// Remember a fresh measurement.
    fn store(&self, path: &Path, size: u64) -> Result<(), ScanError>;
}

/// Cache that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl OverviewSizeCache for NoCache {
    fn load(&self, _path: &Path) -> Option<u64> {
        None
    }

    fn store(&self, _path: &Path, _size: u64) -> Result<(), ScanError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Measurement {
    size: u64,
    measured_at: u64,
}

impl Measurement {
    fn now(size: u64) -> Self {
        Self {
            size,
            measured_at: unix_now(),
        }
    }

    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            None => true,
            Some(ttl) => unix_now().saturating_sub(self.measured_at) <= ttl.as_secs(),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-process cache with an optional time-to-live.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<PathBuf, Measurement>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Create a cache whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache whose entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// Number of remembered paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OverviewSizeCache for MemoryCache {
    fn load(&self, path: &Path) -> Option<u64> {
        self.entries
            .get(path)
            .filter(|m| m.is_fresh(self.ttl))
            .map(|m| m.size)
    }

    fn load_persisted(&self, path: &Path) -> Option<u64> {
        self.entries.get(path).map(|m| m.size)
    }

    fn store(&self, path: &Path, size: u64) -> Result<(), ScanError> {
        self.entries.insert(path.to_path_buf(), Measurement::now(size));
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    path: PathBuf,
    #[serde(flatten)]
    measurement: Measurement,
}

/// Cache persisted as a JSON file.
///
/// `load` honors the time-to-live; `load_persisted` returns stale entries
/// too, which makes the file a last-resort source when nothing else works.
#[derive(Debug)]
pub struct JsonFileCache {
    file: PathBuf,
    ttl: Option<Duration>,
    entries: DashMap<PathBuf, Measurement>,
    write_lock: Mutex<()>,
}

impl JsonFileCache {
    /// Default freshness window for overview sizes.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// Open (or start) the cache stored at `file`.
    ///
    /// A missing file starts an empty cache. An unreadable or corrupt file
    /// is logged and ignored.
    pub fn open(file: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        let file = file.into();
        let entries = DashMap::new();

        match fs::read(&file) {
            Ok(bytes) => match serde_json::from_slice::<Vec<StoredEntry>>(&bytes) {
                Ok(stored) => {
                    for entry in stored {
                        entries.insert(entry.path, entry.measurement);
                    }
                }
                Err(err) => warn!(file = %file.display(), error = %err, "ignoring corrupt size cache"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(file = %file.display(), error = %err, "cannot read size cache"),
        }

        Self {
            file,
            ttl,
            entries,
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    fn persist(&self) -> Result<(), ScanError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ScanError::Other {
                message: "size cache lock poisoned".to_string(),
            })?;

        let mut stored: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|e| StoredEntry {
                path: e.key().clone(),
                measurement: *e.value(),
            })
            .collect();
        stored.sort_by(|a, b| a.path.cmp(&b.path));

        let json = serde_json::to_vec_pretty(&stored).map_err(|e| ScanError::Other {
            message: format!("cannot encode size cache: {e}"),
        })?;

        if let Some(dir) = self.file.parent() {
            fs::create_dir_all(dir).map_err(|e| ScanError::io(dir, e))?;
        }
        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ScanError::io(&tmp, e))?;
        fs::rename(&tmp, &self.file).map_err(|e| ScanError::io(&self.file, e))
    }
}

impl OverviewSizeCache for JsonFileCache {
    fn load(&self, path: &Path) -> Option<u64> {
        self.entries
            .get(path)
            .filter(|m| m.is_fresh(self.ttl))
            .map(|m| m.size)
    }

    fn load_persisted(&self, path: &Path) -> Option<u64> {
        self.entries.get(path).map(|m| m.size)
    }

    fn store(&self, path: &Path, size: u64) -> Result<(), ScanError> {
        self.entries.insert(path.to_path_buf(), Measurement::now(size));
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert!(cache.load(Path::new("/a")).is_none());

        cache.store(Path::new("/a"), 42).unwrap();
        assert_eq!(cache.load(Path::new("/a")), Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_only_persisted() {
        let cache = MemoryCache::with_ttl(Duration::from_secs(60));
        cache.entries.insert(
            PathBuf::from("/old"),
            Measurement {
                size: 7,
                measured_at: unix_now() - 3600,
            },
        );

        assert_eq!(cache.load(Path::new("/old")), None);
        assert_eq!(cache.load_persisted(Path::new("/old")), Some(7));
    }

    #[test]
    fn test_json_cache_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("sizes/overview.json");

        let cache = JsonFileCache::open(&file, Some(JsonFileCache::DEFAULT_TTL));
        cache.store(Path::new("/Users/me"), 1234).unwrap();
        drop(cache);

        let reopened = JsonFileCache::open(&file, Some(JsonFileCache::DEFAULT_TTL));
        assert_eq!(reopened.load(Path::new("/Users/me")), Some(1234));
        assert_eq!(reopened.load_persisted(Path::new("/Users/me")), Some(1234));
    }

    #[test]
    fn test_json_cache_ignores_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("overview.json");
        fs::write(&file, b"not json").unwrap();

        let cache = JsonFileCache::open(&file, None);
        assert!(cache.load(Path::new("/x")).is_none());
        cache.store(Path::new("/x"), 5).unwrap();
        assert_eq!(cache.load(Path::new("/x")), Some(5));
    }
}
