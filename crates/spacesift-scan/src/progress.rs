//! Scan progress reporting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files scanned so far.
    pub files_scanned: u64,
    /// Number of directories scanned so far.
    pub dirs_scanned: u64,
    /// Total bytes scanned so far.
    pub bytes_scanned: u64,
    /// A recently visited path. Advisory only.
    pub current_path: PathBuf,
    /// Number of entries that could not be read.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            current_path: PathBuf::new(),
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Live counters shared by every task of one scan.
#[derive(Debug, Default)]
pub struct ScanCounters {
    files_scanned: AtomicU64,
    dirs_scanned: AtomicU64,
    bytes_scanned: AtomicU64,
    errors: AtomicU64,
}

impl ScanCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.files_scanned.store(0, Ordering::Relaxed);
        self.dirs_scanned.store(0, Ordering::Relaxed);
        self.bytes_scanned.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }

    /// Record one sized file. Returns the file count before this one.
    pub fn record_file(&self, size: u64) -> u64 {
        self.bytes_scanned.fetch_add(size, Ordering::Relaxed);
        self.files_scanned.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a batch of sized files. Returns the file count before them.
    pub fn record_files(&self, count: u64, bytes: u64) -> u64 {
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
        self.files_scanned.fetch_add(count, Ordering::Relaxed)
    }

    /// Record bytes measured in bulk, without visiting files.
    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one sized directory.
    pub fn record_dir(&self) {
        self.dirs_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unreadable entry.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_scanned(&self) -> u64 {
        self.files_scanned.load(Ordering::Relaxed)
    }

    pub fn dirs_scanned(&self) -> u64 {
        self.dirs_scanned.load(Ordering::Relaxed)
    }

    pub fn bytes_scanned(&self) -> u64 {
        self.bytes_scanned.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Publishes sampled progress snapshots to subscribers.
#[derive(Debug)]
pub(crate) struct ProgressSink {
    tx: broadcast::Sender<ScanProgress>,
    every: u64,
    started: Mutex<Instant>,
}

impl ProgressSink {
    pub fn new(every: u64) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            tx,
            every,
            started: Mutex::new(Instant::now()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.tx.subscribe()
    }

    /// Mark the start of a new scan.
    pub fn restart(&self) {
        if let Ok(mut started) = self.started.lock() {
            *started = Instant::now();
        }
    }

    /// Publish a snapshot if the file count crossed a sampling boundary
    /// while moving from `before` to `after`.
    pub fn observe(&self, counters: &ScanCounters, before: u64, after: u64, path: &Path) {
        if self.every == 0 || before / self.every == after / self.every {
            return;
        }
        if self.tx.receiver_count() == 0 {
            return;
        }
        let elapsed = self
            .started
            .lock()
            .map(|s| s.elapsed())
            .unwrap_or_default();
        // Fails only when every receiver has been dropped.
        let _ = self.tx.send(ScanProgress {
            files_scanned: counters.files_scanned(),
            dirs_scanned: counters.dirs_scanned(),
            bytes_scanned: counters.bytes_scanned(),
            current_path: path.to_path_buf(),
            errors_count: counters.errors(),
            elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_reset() {
        let counters = ScanCounters::new();
        assert_eq!(counters.record_file(10), 0);
        assert_eq!(counters.record_files(3, 30), 1);
        counters.record_dir();
        counters.record_error();

        assert_eq!(counters.files_scanned(), 4);
        assert_eq!(counters.bytes_scanned(), 40);
        assert_eq!(counters.dirs_scanned(), 1);
        assert_eq!(counters.errors(), 1);

        counters.reset();
        assert_eq!(counters.files_scanned(), 0);
        assert_eq!(counters.bytes_scanned(), 0);
    }

    #[test]
    fn test_sink_samples_on_boundary() {
        let sink = ProgressSink::new(10);
        let mut rx = sink.subscribe();
        let counters = ScanCounters::new();

        sink.observe(&counters, 3, 4, Path::new("/a"));
        assert!(rx.try_recv().is_err());

        sink.observe(&counters, 9, 10, Path::new("/b"));
        let progress = rx.try_recv().unwrap();
        assert_eq!(progress.current_path, PathBuf::from("/b"));

        // A batch jumping over a boundary also publishes.
        sink.observe(&counters, 15, 27, Path::new("/c"));
        assert_eq!(rx.try_recv().unwrap().current_path, PathBuf::from("/c"));
    }

    #[test]
    fn test_progress_rates() {
        let progress = ScanProgress {
            files_scanned: 100,
            bytes_scanned: 1000,
            elapsed: Duration::from_secs(10),
            ..ScanProgress::new()
        };
        assert_eq!(progress.files_per_second(), 10.0);
        assert_eq!(progress.bytes_per_second(), 100.0);
        assert_eq!(progress.total_items(), 100);
    }
}
