//! Scan configuration types.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Directories that hold huge numbers of small files and are sized in bulk.
const DEFAULT_FOLD_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".Trash",
    ".npm",
    ".tnpm",
    ".yarn",
    ".pnpm-store",
    ".bun",
    "bower_components",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".gradle",
    ".m2",
    ".ivy2",
    ".cargo",
    ".rustup",
    "Pods",
    "DerivedData",
    ".next",
    ".nuxt",
    ".angular",
    ".terraform",
];

/// Extensions never reported as large files (source, text, config).
const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    "go", "js", "mjs", "cjs", "ts", "tsx", "jsx", "py", "rs", "java", "kt", "c", "cc", "cpp",
    "h", "hpp", "m", "mm", "swift", "rb", "php", "sh", "md", "txt", "json", "yaml", "yml",
    "toml", "xml", "html", "css", "scss", "lock", "log",
];

/// Pseudo-filesystem bookkeeping directories skipped wherever they appear.
const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".Spotlight-V100",
    ".fseventsd",
    ".DocumentRevisions-V100",
    ".TemporaryItems",
    ".Trashes",
];

/// OS-critical directories skipped when scanning `/`.
const DEFAULT_SYSTEM_DIRS: &[&str] = &[
    "dev", "tmp", "private", "cores", "net", "home", "System", "sbin", "bin", "etc", "var",
    "opt", "usr", "Volumes", "Network", ".vol", "proc", "sys", "run", "boot", "lost+found",
    "mnt", "media", "snap",
];

const NPM_CACHE_ROOTS: &[&str] = &[".npm", ".tnpm"];

fn set_of(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_fold_dirs() -> HashSet<String> {
    set_of(DEFAULT_FOLD_DIRS)
}

fn default_skip_extensions() -> HashSet<String> {
    set_of(DEFAULT_SKIP_EXTENSIONS)
}

fn default_skip_dirs() -> HashSet<String> {
    set_of(DEFAULT_SKIP_DIRS)
}

fn default_system_dirs() -> HashSet<String> {
    set_of(DEFAULT_SYSTEM_DIRS)
}

fn default_home_dir() -> Option<PathBuf> {
    home::home_dir().filter(|p| !p.as_os_str().is_empty())
}

fn default_fast_walk_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 4)
        .unwrap_or(4)
        .min(64)
}

/// Configuration for sizing operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct ScanConfig {
    /// Number of immediate children reported.
    #[builder(default = "30")]
    pub max_entries: usize,

    /// Number of large files reported.
    #[builder(default = "30")]
    pub max_large_files: usize,

    /// Minimum actual size for a file to count as large.
    #[builder(default = "100 * 1024 * 1024")]
    pub min_large_file_size: u64,

    /// Directory names sized in bulk instead of walked.
    #[builder(default = "default_fold_dirs()")]
    pub fold_dirs: HashSet<String>,

    /// Lowercase extensions (without the dot) excluded from large files.
    #[builder(default = "default_skip_extensions()")]
    pub skip_extensions: HashSet<String>,

    /// Directory names skipped at the scan root.
    #[builder(default = "default_skip_dirs()")]
    pub skip_dirs: HashSet<String>,

    /// Directory names skipped when the scan root is `/`.
    #[builder(default = "default_system_dirs()")]
    pub system_dirs: HashSet<String>,

    /// Home directory; enables the cached subtree and overview exclusion.
    #[builder(default = "default_home_dir()")]
    pub home_dir: Option<PathBuf>,

    /// Name of the large subtree under home that is measured separately.
    #[builder(default = "\"Library\".to_string()")]
    pub cached_subtree_name: String,

    /// Fixed worker count (None = derive from CPU count).
    #[builder(default)]
    pub workers: Option<usize>,

    /// Workers per CPU when deriving the worker count.
    #[builder(default = "4")]
    pub cpu_multiplier: usize,

    /// Lower bound on the derived worker count.
    #[builder(default = "16")]
    pub min_workers: usize,

    /// Upper bound on the derived worker count.
    #[builder(default = "64")]
    pub max_workers: usize,

    /// Threads for the fast fallback walker.
    #[builder(default = "default_fast_walk_threads()")]
    pub fast_walk_threads: usize,

    /// Time limit for one `du` invocation.
    #[builder(default = "Duration::from_secs(30)")]
    pub du_timeout: Duration,

    /// Time limit for one content-index query.
    #[builder(default = "Duration::from_secs(5)")]
    pub index_timeout: Duration,

    /// Soft deadline for the fast fallback walker.
    #[builder(default = "Duration::from_secs(300)")]
    pub fast_walk_deadline: Duration,

    /// Publish a progress snapshot every this many files (0 = never).
    #[builder(default = "100")]
    pub progress_every: u64,
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_workers == Some(0) {
            return Err("max_workers must be at least 1".to_string());
        }
        if let (Some(min), Some(max)) = (self.min_workers, self.max_workers) {
            if min > max {
                return Err(format!("min_workers ({min}) exceeds max_workers ({max})"));
            }
        }
        if self.workers == Some(Some(0)) {
            return Err("workers must be at least 1".to_string());
        }
        if self.fast_walk_threads == Some(0) {
            return Err("fast_walk_threads must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Check if a directory should be sized in bulk instead of walked.
    ///
    /// Besides the fold set, npm-style caches are folded structurally:
    /// anything directly under the cache root or an `_`-prefixed directory,
    /// and every single-character shard directory.
    pub fn should_fold(&self, name: &str, path: &Path) -> bool {
        if self.fold_dirs.contains(name) {
            return true;
        }

        let Some(parent) = path.parent() else {
            return false;
        };
        let under_npm_cache = parent
            .components()
            .any(|c| NPM_CACHE_ROOTS.iter().any(|root| c.as_os_str() == *root));
        if !under_npm_cache {
            return false;
        }

        let parent_name = parent
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if NPM_CACHE_ROOTS.contains(&parent_name.as_ref()) || parent_name.starts_with('_') {
            return true;
        }
        name.chars().count() == 1
    }

    /// Check if a path lies inside (or is) a folded directory.
    pub fn is_in_folded_dir(&self, path: &Path) -> bool {
        path.components()
            .any(|c| self.fold_dirs.contains(c.as_os_str().to_string_lossy().as_ref()))
    }

    /// Check if a file is excluded from large-file tracking by extension.
    pub fn should_skip_large_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                self.skip_extensions
                    .contains(&ext.to_string_lossy().to_ascii_lowercase())
            })
            .unwrap_or(false)
    }

    /// Check if an immediate child directory is never descended.
    pub fn is_denylisted(&self, name: &str, root_is_filesystem_root: bool) -> bool {
        self.skip_dirs.contains(name)
            || (root_is_filesystem_root && self.system_dirs.contains(name))
    }

    /// Path of the separately measured subtree under home, if known.
    pub fn cached_subtree_path(&self) -> Option<PathBuf> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(&self.cached_subtree_name))
    }

    /// Check if `path` is the home directory.
    pub fn is_home(&self, path: &Path) -> bool {
        self.home_dir.as_deref() == Some(path)
    }

    /// Worker-pool size for a root with `children` immediate children.
    pub fn worker_count(&self, cpus: usize, children: usize) -> usize {
        let derived = self.workers.unwrap_or_else(|| {
            cpus.saturating_mul(self.cpu_multiplier)
                .max(self.min_workers)
                .min(self.max_workers)
        });
        derived.min(children).max(1)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_entries: 30,
            max_large_files: 30,
            min_large_file_size: 100 * 1024 * 1024,
            fold_dirs: default_fold_dirs(),
            skip_extensions: default_skip_extensions(),
            skip_dirs: default_skip_dirs(),
            system_dirs: default_system_dirs(),
            home_dir: default_home_dir(),
            cached_subtree_name: "Library".to_string(),
            workers: None,
            cpu_multiplier: 4,
            min_workers: 16,
            max_workers: 64,
            fast_walk_threads: default_fast_walk_threads(),
            du_timeout: Duration::from_secs(30),
            index_timeout: Duration::from_secs(5),
            fast_walk_deadline: Duration::from_secs(300),
            progress_every: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .max_entries(5usize)
            .workers(Some(2usize))
            .home_dir(Some(PathBuf::from("/Users/me")))
            .build()
            .unwrap();

        assert_eq!(config.max_entries, 5);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.max_large_files, 30);
        assert_eq!(
            config.cached_subtree_path(),
            Some(PathBuf::from("/Users/me/Library"))
        );
    }

    #[test]
    fn test_builder_rejects_inverted_bounds() {
        let result = ScanConfig::builder()
            .min_workers(10usize)
            .max_workers(2usize)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_should_fold() {
        let config = ScanConfig::default();

        assert!(config.should_fold("node_modules", Path::new("/p/node_modules")));
        assert!(config.should_fold("_cacache", Path::new("/h/.npm/_cacache")));
        assert!(config.should_fold("index-v5", Path::new("/h/.npm/_cacache/index-v5")));
        assert!(config.should_fold("a", Path::new("/h/.tnpm/x/y/a")));
        assert!(!config.should_fold("src", Path::new("/h/project/src")));
        assert!(!config.should_fold("a", Path::new("/h/project/a")));
        assert!(!config.should_fold("long", Path::new("/h/.npm/_cacache/x/long")));
    }

    #[test]
    fn test_skip_large_file_extension() {
        let config = ScanConfig::default();
        assert!(config.should_skip_large_file(Path::new("/a/main.RS")));
        assert!(config.should_skip_large_file(Path::new("/a/notes.txt")));
        assert!(!config.should_skip_large_file(Path::new("/a/movie.mkv")));
        assert!(!config.should_skip_large_file(Path::new("/a/noext")));
    }

    #[test]
    fn test_is_in_folded_dir() {
        let config = ScanConfig::default();
        assert!(config.is_in_folded_dir(Path::new("/p/node_modules/x/big.bin")));
        assert!(!config.is_in_folded_dir(Path::new("/p/videos/big.bin")));
    }

    #[test]
    fn test_denylist_scope() {
        let config = ScanConfig::default();
        assert!(config.is_denylisted("proc", true));
        assert!(!config.is_denylisted("proc", false));
        assert!(config.is_denylisted(".fseventsd", false));
    }

    #[test]
    fn test_worker_count() {
        let config = ScanConfig::default();
        // 2 cpus * 4 = 8, raised to the 16 minimum.
        assert_eq!(config.worker_count(2, 100), 16);
        // 32 cpus * 4 = 128, capped at 64.
        assert_eq!(config.worker_count(32, 100), 64);
        // Never more workers than children, never fewer than one.
        assert_eq!(config.worker_count(8, 3), 3);
        assert_eq!(config.worker_count(8, 0), 1);

        let fixed = ScanConfig {
            workers: Some(1),
            ..ScanConfig::default()
        };
        assert_eq!(fixed.worker_count(8, 100), 1);
    }
}
