//! Sizing strategy selection for immediate children of the scan root.

use std::fs::FileType;
use std::path::Path;

use spacesift_core::ScanConfig;

/// What an entry is, as far as sizing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Symlink,
    Dir,
    File,
}

impl From<FileType> for EntryType {
    fn from(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Dir
        } else {
            Self::File
        }
    }
}

/// How an immediate child of the root gets sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// Symbolic link: only the link itself is sized.
    Link,
    /// Large subtree under home whose size is reused from the cache.
    CachedSubtree,
    /// Directory sized in bulk by the usage tool.
    FoldedSubtree,
    /// Directory never descended.
    DenylistedSubtree,
    /// Directory walked file by file.
    OrdinarySubtree,
    /// Regular file (or any other non-directory).
    PlainFile,
}

/// Facts about the scan root that influence classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootContext {
    /// The root is `/`.
    pub is_filesystem_root: bool,
    /// The root is the configured home directory.
    pub is_home: bool,
}

impl RootContext {
    pub fn for_root(root: &Path, config: &ScanConfig) -> Self {
        Self {
            is_filesystem_root: root == Path::new("/"),
            is_home: config.is_home(root),
        }
    }
}

/// Pick the sizing strategy for one immediate child of the root.
pub fn classify_child(
    name: &str,
    path: &Path,
    entry_type: EntryType,
    root: RootContext,
    config: &ScanConfig,
) -> ChildKind {
    match entry_type {
        EntryType::Symlink => ChildKind::Link,
        EntryType::File => ChildKind::PlainFile,
        EntryType::Dir => {
            if config.is_denylisted(name, root.is_filesystem_root) {
                ChildKind::DenylistedSubtree
            } else if root.is_home && name == config.cached_subtree_name {
                ChildKind::CachedSubtree
            } else if config.should_fold(name, path) {
                ChildKind::FoldedSubtree
            } else {
                ChildKind::OrdinarySubtree
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> ScanConfig {
        ScanConfig {
            home_dir: Some(PathBuf::from("/Users/me")),
            ..ScanConfig::default()
        }
    }

    fn classify(root: &str, name: &str, entry_type: EntryType) -> ChildKind {
        let config = config();
        let root = Path::new(root);
        classify_child(
            name,
            &root.join(name),
            entry_type,
            RootContext::for_root(root, &config),
            &config,
        )
    }

    #[test]
    fn test_links_and_files() {
        assert_eq!(classify("/data", "x", EntryType::Symlink), ChildKind::Link);
        assert_eq!(classify("/data", "x", EntryType::File), ChildKind::PlainFile);
    }

    #[test]
    fn test_cached_subtree_only_under_home() {
        assert_eq!(
            classify("/Users/me", "Library", EntryType::Dir),
            ChildKind::CachedSubtree
        );
        assert_eq!(
            classify("/Users/me", "library", EntryType::Dir),
            ChildKind::OrdinarySubtree
        );
        assert_eq!(
            classify("/Users/other", "Library", EntryType::Dir),
            ChildKind::OrdinarySubtree
        );
    }

    #[test]
    fn test_system_dirs_only_at_filesystem_root() {
        assert_eq!(classify("/", "usr", EntryType::Dir), ChildKind::DenylistedSubtree);
        assert_eq!(classify("/data", "usr", EntryType::Dir), ChildKind::OrdinarySubtree);
        assert_eq!(
            classify("/data", ".fseventsd", EntryType::Dir),
            ChildKind::DenylistedSubtree
        );
    }

    #[test]
    fn test_folded() {
        assert_eq!(
            classify("/Users/me/project", "node_modules", EntryType::Dir),
            ChildKind::FoldedSubtree
        );
        assert_eq!(
            classify("/Users/me/.npm", "_cacache", EntryType::Dir),
            ChildKind::FoldedSubtree
        );
    }
}
