//! Error types for sizing operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can surface from a scan or an overview measurement.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path is empty or not absolute.
    #[error("Invalid path: {path} ({reason})")]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Every sizing strategy failed.
    #[error("Unable to measure size of {path}")]
    MeasureFailed { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Failure of an external sizing or search tool.
///
/// None of these are fatal: callers fall through to their next strategy.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool did not finish in time and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: &'static str, timeout: Duration },

    /// The tool's output could not be parsed.
    #[error("failed to parse {tool} output: {output:?}")]
    Parse { tool: &'static str, output: String },

    /// The tool reported a size that cannot be right.
    #[error("{tool} reported invalid size {value}")]
    InvalidResult { tool: &'static str, value: i64 },

    /// The measured path does not exist.
    #[error("path does not exist: {path}")]
    NotFound { path: PathBuf },

    /// The tool could not be started.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully.
    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    /// The tool is not available on this platform.
    #[error("{tool} is not available")]
    Unavailable { tool: &'static str },
}

impl ToolError {
    /// Check if the failure was caused by a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));

        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[test]
    fn test_tool_error_not_found() {
        let err = ToolError::NotFound {
            path: PathBuf::from("/nope"),
        };
        assert!(err.is_not_found());

        let err = ToolError::Timeout {
            tool: "du",
            timeout: Duration::from_secs(1),
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("du timed out"));
    }
}
