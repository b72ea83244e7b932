//! Scan orchestration: size every immediate child of a root concurrently
//! and collect the largest children and files.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};
use spacesift_core::{
    BoundedTopN, DirEntry, FileEntry, Measured, ScanConfig, ScanError, ScanResult,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::{NoCache, OverviewSizeCache};
use crate::classify::{ChildKind, EntryType, RootContext, classify_child};
use crate::coalesce::InFlight;
use crate::du::{DuTool, UsageTool};
use crate::index::{IndexSearch, find_large_files, platform_index};
use crate::probe;
use crate::progress::{ProgressSink, ScanCounters, ScanProgress};
use crate::walker::Walker;

/// Upper bound on slots in each candidate queue.
const QUEUE_BOUND: usize = 1024;

/// Directory-size and large-file discovery engine.
///
/// Owns its collaborators (usage tool, content index, size cache), the
/// progress channel and the tables of measurements in flight; build one
/// and reuse it across scans.
pub struct SizeScanner {
    pub(crate) config: Arc<ScanConfig>,
    pub(crate) usage: Arc<dyn UsageTool>,
    pub(crate) index: Arc<dyn IndexSearch>,
    pub(crate) cache: Arc<dyn OverviewSizeCache>,
    pub(crate) overviews: InFlight,
    folds: InFlight,
    counters: Arc<ScanCounters>,
    progress: ProgressSink,
}

impl SizeScanner {
    /// Create a scanner using `du`, the platform index and no size cache.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            usage: Arc::new(DuTool::new(config.du_timeout)),
            index: Arc::from(platform_index(config.index_timeout)),
            cache: Arc::new(NoCache),
            overviews: InFlight::new(),
            folds: InFlight::new(),
            counters: Arc::new(ScanCounters::new()),
            progress: ProgressSink::new(config.progress_every),
            config: Arc::new(config),
        }
    }

    /// Replace the bulk usage tool.
    pub fn with_usage_tool(mut self, usage: Arc<dyn UsageTool>) -> Self {
        self.usage = usage;
        self
    }

    /// Replace the content index used for large-file discovery.
    pub fn with_index(mut self, index: Arc<dyn IndexSearch>) -> Self {
        self.index = index;
        self
    }

    /// Replace the overview size cache.
    pub fn with_cache(mut self, cache: Arc<dyn OverviewSizeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Live counters of the current (or last) scan.
    pub fn counters(&self) -> Arc<ScanCounters> {
        Arc::clone(&self.counters)
    }

    /// Subscribe to sampled scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    /// Size every immediate child of `root`.
    ///
    /// Children are sized by a fixed number of worker threads. Children
    /// that cannot be read contribute nothing and are left out of the
    /// entries; only an unreadable root fails the scan.
    pub fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        self.counters.reset();
        self.progress.restart();

        let children: Vec<fs::DirEntry> = fs::read_dir(root)
            .map_err(|e| ScanError::io(root, e))?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    self.counters.record_error();
                    debug!(root = %root.display(), error = %err, "skipping unreadable child");
                    None
                }
            })
            .collect();

        let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = self.config.worker_count(cpus, children.len());
        info!(root = %root.display(), children = children.len(), workers, "scanning");

        let context = RootContext::for_root(root, &self.config);
        let walker = Walker::new(
            Arc::clone(&self.config),
            &self.counters,
            self.usage.as_ref(),
            &self.progress,
            &self.folds,
        );
        let total = AtomicU64::new(0);

        let (job_tx, job_rx) = bounded::<ChildJob>(workers.saturating_mul(2).min(QUEUE_BOUND));
        let (entry_tx, entry_rx) = bounded::<DirEntry>(children.len().clamp(1, QUEUE_BOUND));
        let file_bound = self.config.max_large_files.saturating_mul(2).clamp(1, QUEUE_BOUND);
        let (file_tx, file_rx) = bounded::<FileEntry>(file_bound);

        let (entries, walked_large_files) = thread::scope(|s| {
            let max_entries = self.config.max_entries;
            let max_large_files = self.config.max_large_files;
            let entries_collector = s.spawn(move || collect_top(entry_rx, max_entries));
            let files_collector = s.spawn(move || collect_top(file_rx, max_large_files));

            for i in 0..workers {
                let job_rx = job_rx.clone();
                let entry_tx = entry_tx.clone();
                let file_tx = file_tx.clone();
                let walker = &walker;
                let total = &total;
                thread::Builder::new()
                    .name(format!("spacesift-scan-{i}"))
                    .spawn_scoped(s, move || {
                        for job in job_rx {
                            if let Some(entry) = self.size_child(job, walker, &file_tx) {
                                total.fetch_add(entry.size(), Ordering::Relaxed);
                                let _ = entry_tx.send(entry);
                            }
                        }
                    })
                    .map_err(|e| ScanError::Other {
                        message: format!("cannot start scan worker: {e}"),
                    })?;
            }
            drop(job_rx);
            drop(entry_tx);
            drop(file_tx);

            for child in children {
                let name = child.file_name().to_string_lossy().into_owned();
                let path = child.path();
                let entry_type = match child.file_type() {
                    Ok(file_type) => EntryType::from(file_type),
                    Err(err) => {
                        self.counters.record_error();
                        debug!(path = %path.display(), error = %err, "skipping child");
                        continue;
                    }
                };

                let kind = classify_child(&name, &path, entry_type, context, &self.config);
                if kind == ChildKind::DenylistedSubtree {
                    debug!(path = %path.display(), "skipping denylisted directory");
                    continue;
                }

                let job = ChildJob {
                    name,
                    entry: child,
                    kind,
                };
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);

            let entries = entries_collector.join().map_err(|_| ScanError::Other {
                message: "entry collector panicked".to_string(),
            })?;
            let files = files_collector.join().map_err(|_| ScanError::Other {
                message: "large-file collector panicked".to_string(),
            })?;
            Ok::<_, ScanError>((entries, files))
        })?;

        let indexed = find_large_files(
            self.index.as_ref(),
            root,
            self.config.min_large_file_size,
            &self.config,
        );
        let large_files = if indexed.is_empty() {
            walked_large_files
        } else {
            debug!(count = indexed.len(), "using content index for large files");
            indexed
        };

        let result = ScanResult {
            root: root.to_path_buf(),
            entries,
            large_files,
            total_size: total.into_inner(),
            files_scanned: self.counters.files_scanned(),
            dirs_scanned: self.counters.dirs_scanned(),
            scan_duration: start.elapsed(),
        };
        info!(
            root = %root.display(),
            total_size = result.total_size,
            files = result.files_scanned,
            elapsed_ms = result.scan_duration.as_millis() as u64,
            "scan finished"
        );
        Ok(result)
    }

    /// Size one child according to its kind. `None` if it could not be read.
    fn size_child(
        &self,
        job: ChildJob,
        walker: &Walker<'_>,
        large_files: &Sender<FileEntry>,
    ) -> Option<DirEntry> {
        let ChildJob { name, entry, kind } = job;
        let path = entry.path();

        match kind {
            ChildKind::Link => {
                let metadata = self.child_metadata(&entry)?;
                let size = probe::actual_size(&metadata);
                self.counters.record_file(size);
                let target_is_dir = fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
                Some(DirEntry::link(
                    &name,
                    path,
                    size,
                    target_is_dir,
                    probe::last_access(&metadata),
                ))
            }
            ChildKind::PlainFile => {
                let metadata = self.child_metadata(&entry)?;
                let size = probe::actual_size(&metadata);
                self.counters.record_file(size);
                if size >= self.config.min_large_file_size
                    && !self.config.should_skip_large_file(&path)
                {
                    let _ = large_files.send(FileEntry::new(name.as_str(), path.clone(), size));
                }
                Some(DirEntry::file(name, path, size, probe::last_access(&metadata)))
            }
            ChildKind::CachedSubtree => {
                let size = match self
                    .cache
                    .load(&path)
                    .filter(|size| *size > 0)
                    .or_else(|| self.cache.load_persisted(&path))
                {
                    Some(size) => size,
                    None => walker.dir_size(&path, large_files)?,
                };
                self.counters.record_dir();
                Some(self.directory_entry(&entry, name, path, size))
            }
            ChildKind::FoldedSubtree => {
                let size = walker.folded_size(&path);
                self.counters.record_dir();
                Some(self.directory_entry(&entry, name, path, size))
            }
            ChildKind::OrdinarySubtree => {
                let size = walker.dir_size(&path, large_files)?;
                self.counters.record_dir();
                Some(self.directory_entry(&entry, name, path, size))
            }
            ChildKind::DenylistedSubtree => None,
        }
    }

    fn directory_entry(
        &self,
        entry: &fs::DirEntry,
        name: String,
        path: std::path::PathBuf,
        size: u64,
    ) -> DirEntry {
        let last_access = entry.metadata().ok().and_then(|m| probe::last_access(&m));
        DirEntry::directory(name, path, size).with_last_access(last_access)
    }

    fn child_metadata(&self, entry: &fs::DirEntry) -> Option<fs::Metadata> {
        match entry.metadata() {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                self.counters.record_error();
                debug!(path = %entry.path().display(), error = %err, "cannot stat child");
                None
            }
        }
    }
}

/// One classified child waiting for a worker.
struct ChildJob {
    name: String,
    entry: fs::DirEntry,
    kind: ChildKind,
}

/// Drain `rx` into a bounded top-N tracker, largest first.
fn collect_top<T: Measured>(rx: Receiver<T>, capacity: usize) -> Vec<T> {
    let mut top = BoundedTopN::new(capacity);
    for item in rx {
        top.push(item);
    }
    top.into_sorted_desc()
}
