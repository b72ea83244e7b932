//! Recursive directory sizing built on jwalk.
//!
//! Two variants share this module:
//!
//! - the **default walker** visits every entry, hands bulky directories to
//!   the usage tool instead of descending into them, and forwards large
//!   files to the collector channel.
//! - the **fast walker** only sums sizes. It walks on its own, wider pool
//!   under a soft deadline and is used when the usage tool cannot size a
//!   folded directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use spacesift_core::{FileEntry, ScanConfig};
use tracing::debug;

use crate::coalesce::InFlight;
use crate::du::UsageTool;
use crate::probe;
use crate::progress::{ProgressSink, ScanCounters};

/// How long a walk waits on the shared rayon pool before giving up on a
/// directory. Many subtrees are walked on that pool at once.
const WALK_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for sizing the subtrees of one scan.
pub(crate) struct Walker<'a> {
    config: Arc<ScanConfig>,
    counters: &'a ScanCounters,
    usage: &'a dyn UsageTool,
    progress: &'a ProgressSink,
    folds: &'a InFlight,
}

impl<'a> Walker<'a> {
    pub fn new(
        config: Arc<ScanConfig>,
        counters: &'a ScanCounters,
        usage: &'a dyn UsageTool,
        progress: &'a ProgressSink,
        folds: &'a InFlight,
    ) -> Self {
        Self {
            config,
            counters,
            usage,
            progress,
            folds,
        }
    }

    /// Total actual size of `dir`, or `None` if `dir` itself cannot be read.
    ///
    /// Files at or above the large-file threshold are sent to `large_files`.
    /// Folded directories are not descended; they are measured afterwards
    /// with the usage tool, in parallel on the global rayon pool. Call this
    /// from outside that pool: the walk itself runs there.
    pub fn dir_size(&self, dir: &Path, large_files: &Sender<FileEntry>) -> Option<u64> {
        let config = Arc::clone(&self.config);
        let walk = WalkDir::new(dir)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: WALK_BUSY_TIMEOUT,
            })
            .skip_hidden(false)
            .follow_links(false)
            .process_read_dir(move |_depth, _dir, _state, children| {
                for child in children.iter_mut().flatten() {
                    if child.file_type().is_dir()
                        && config.should_fold(&child.file_name().to_string_lossy(), &child.path())
                    {
                        child.read_children_path = None;
                    }
                }
            });

        let mut total: u64 = 0;
        let mut folded: Vec<PathBuf> = Vec::new();

        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.path() == Some(dir) {
                        debug!(path = %dir.display(), error = %err, "cannot read directory");
                        self.counters.record_error();
                        return None;
                    }
                    self.skip(&err);
                    continue;
                }
            };

            if let Some(err) = &entry.read_children_error {
                if entry.depth() == 0 {
                    debug!(path = %dir.display(), error = %err, "cannot read directory");
                    self.counters.record_error();
                    return None;
                }
                self.skip(err);
            }
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.counters.record_dir();
                if entry.read_children_path.is_none() {
                    folded.push(path);
                }
                continue;
            }

            // Links are never followed; only the link itself counts.
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    self.skip(&err);
                    continue;
                }
            };
            let size = probe::actual_size(&metadata);
            total += size;

            let before = self.counters.record_file(size);
            self.progress.observe(self.counters, before, before + 1, &path);

            if file_type.is_file() && self.is_large_file(&path, size) {
                let name = entry.file_name().to_string_lossy().into_owned();
                let _ = large_files.send(FileEntry::new(name, path, size));
            }
        }

        total += folded
            .par_iter()
            .map(|path| self.folded_size(path))
            .sum::<u64>();
        Some(total)
    }

    /// Size of a folded directory: one bulk measurement, or a fast walk if
    /// the usage tool fails. Concurrent requests for the same directory
    /// share one measurement.
    pub fn folded_size(&self, dir: &Path) -> u64 {
        self.folds
            .run(dir, || Ok::<_, ()>(self.measure_folded(dir)))
            .unwrap_or_default()
    }

    fn measure_folded(&self, dir: &Path) -> u64 {
        match self.usage.measure(dir) {
            Ok(size) if size > 0 => {
                self.counters.record_bytes(size);
                size
            }
            Ok(_) => {
                debug!(path = %dir.display(), "usage tool reported zero, walking instead");
                self.fast_dir_size(dir)
            }
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "usage tool failed, walking instead");
                self.fast_dir_size(dir)
            }
        }
    }

    /// Total actual size of `dir` using the fast walker.
    ///
    /// Stops expanding new directories once the configured deadline has
    /// passed; whatever was summed by then is returned.
    pub fn fast_dir_size(&self, dir: &Path) -> u64 {
        let deadline = Instant::now() + self.config.fast_walk_deadline;
        let walk = WalkDir::new(dir)
            .parallelism(Parallelism::RayonNewPool(self.config.fast_walk_threads))
            .skip_hidden(false)
            .follow_links(false)
            .process_read_dir(move |_depth, _dir, _state, children| {
                if Instant::now() >= deadline {
                    children.clear();
                }
            });

        let mut total: u64 = 0;
        for entry in walk.into_iter().filter_map(Result::ok) {
            if entry.depth() == 0 {
                continue;
            }
            if entry.file_type().is_dir() {
                self.counters.record_dir();
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let size = probe::actual_size(&metadata);
            total += size;

            let before = self.counters.record_file(size);
            self.progress.observe(self.counters, before, before + 1, &entry.path());
        }
        total
    }

    fn is_large_file(&self, path: &Path, size: u64) -> bool {
        size >= self.config.min_large_file_size && !self.config.should_skip_large_file(path)
    }

    fn skip(&self, err: &jwalk::Error) {
        self.counters.record_error();
        debug!(path = ?err.path(), error = %err, "skipping unreadable entry");
    }
}
