//! Directory-size and large-file discovery engine for spacesift.
//!
//! # Overview
//!
//! `spacesift-scan` measures how much disk space a directory tree really
//! uses and, in the same pass, finds the largest immediate children of the
//! root and the largest files anywhere below it. Key features:
//!
//! - **Parallel sizing** of every child on a bounded set of workers,
//!   each walking with jwalk
//! - **Actual disk usage**: sparse and placeholder files count for what
//!   they occupy, not their apparent length
//! - **Folding**: directories known to hold huge numbers of tiny files are
//!   measured in bulk with `du` instead of being walked
//! - **Bounded memory**: only the top N children and files are retained
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use spacesift_scan::{ScanConfig, SizeScanner};
//!
//! let scanner = SizeScanner::new(ScanConfig::default());
//! let result = scanner.scan(std::path::Path::new("/path/to/scan")).unwrap();
//!
//! println!("Total size: {} bytes", result.total_size);
//! for entry in &result.entries {
//!     println!("{:>12}  {}", entry.size, entry.name);
//! }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use spacesift_scan::{ScanConfig, SizeScanner};
//!
//! let scanner = SizeScanner::new(ScanConfig::default());
//! let mut progress_rx = scanner.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         eprintln!("{} files, at {}", progress.files_scanned, progress.current_path.display());
//!     }
//! });
//! ```

mod cache;
mod classify;
mod coalesce;
mod du;
mod index;
mod overview;
mod probe;
mod process;
mod progress;
mod scanner;
mod walker;

pub use cache::{JsonFileCache, MemoryCache, NoCache, OverviewSizeCache};
pub use classify::{ChildKind, EntryType, RootContext, classify_child};
pub use du::{DuTool, UsageTool, parse_kilobytes};
pub use index::{IndexSearch, MdfindIndex, NoIndex, find_large_files, platform_index};
pub use overview::walk_size_excluding;
pub use probe::{actual_size, last_access};
pub use progress::{ScanCounters, ScanProgress};
pub use scanner::SizeScanner;

// Re-export core types for convenience
pub use spacesift_core::{
    BoundedTopN, DirEntry, FileEntry, Measured, ScanConfig, ScanError, ScanResult, ToolError,
};
