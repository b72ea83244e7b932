//! Bulk subtree sizing through an external usage tool.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use spacesift_core::ToolError;

use crate::process::run_with_timeout;

const DU: &str = "du";

/// Measures a whole subtree in one call.
pub trait UsageTool: Send + Sync {
    /// Total on-disk bytes under `path`.
    fn measure(&self, path: &Path) -> Result<u64, ToolError>;

    /// Bytes under `path` minus the bytes under `exclude`.
    ///
    /// The two measurements are independent, so the subtree may change in
    /// between. An exclusion larger than the total is treated as zero, and
    /// a missing `exclude` path counts as zero.
    fn measure_excluding(&self, path: &Path, exclude: &Path) -> Result<u64, ToolError> {
        let total = self.measure(path)?;
        let excluded = match self.measure(exclude) {
            Ok(size) => size,
            Err(err) if err.is_not_found() => 0,
            Err(err) => return Err(err),
        };
        let excluded = if excluded > total { 0 } else { excluded };
        Ok(total - excluded)
    }
}

/// `du -sk` wrapper.
#[derive(Debug, Clone)]
pub struct DuTool {
    timeout: Duration,
}

impl DuTool {
    /// Create a wrapper that gives each invocation at most `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DuTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl UsageTool for DuTool {
    fn measure(&self, path: &Path) -> Result<u64, ToolError> {
        if let Err(err) = std::fs::metadata(path) {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(ToolError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let mut command = Command::new(DU);
        command.arg("-sk").arg(path);
        let output = run_with_timeout(DU, command, self.timeout)?;
        parse_kilobytes(&output.stdout)
    }
}

/// Parse the leading kilobyte field of `du -sk` output into bytes.
pub fn parse_kilobytes(stdout: &str) -> Result<u64, ToolError> {
    let field = stdout
        .split_whitespace()
        .next()
        .ok_or_else(|| ToolError::Parse {
            tool: DU,
            output: stdout.to_string(),
        })?;

    let kb: i64 = field.parse().map_err(|_| ToolError::Parse {
        tool: DU,
        output: stdout.to_string(),
    })?;

    if kb <= 0 {
        return Err(ToolError::InvalidResult { tool: DU, value: kb });
    }

    Ok((kb as u64).saturating_mul(1024))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FixedSizes(HashMap<PathBuf, u64>);

    impl UsageTool for FixedSizes {
        fn measure(&self, path: &Path) -> Result<u64, ToolError> {
            self.0.get(path).copied().ok_or_else(|| ToolError::NotFound {
                path: path.to_path_buf(),
            })
        }
    }

    fn sizes(pairs: &[(&str, u64)]) -> FixedSizes {
        FixedSizes(
            pairs
                .iter()
                .map(|(p, s)| (PathBuf::from(p), *s))
                .collect(),
        )
    }

    #[test]
    fn test_parse_kilobytes() {
        assert_eq!(parse_kilobytes("12\t/some/path\n").unwrap(), 12 * 1024);
        assert!(matches!(
            parse_kilobytes("0\t/x"),
            Err(ToolError::InvalidResult { value: 0, .. })
        ));
        assert!(matches!(parse_kilobytes(""), Err(ToolError::Parse { .. })));
        assert!(matches!(
            parse_kilobytes("du: cannot access"),
            Err(ToolError::Parse { .. })
        ));
    }

    #[test]
    fn test_measure_excluding_subtracts() {
        let tool = sizes(&[("/home", 800), ("/home/Library", 500)]);
        let size = tool
            .measure_excluding(Path::new("/home"), Path::new("/home/Library"))
            .unwrap();
        assert_eq!(size, 300);
    }

    #[test]
    fn test_measure_excluding_clamps_oversized_exclusion() {
        // The subtree grew between the two measurements.
        let tool = sizes(&[("/home", 800), ("/home/Library", 900)]);
        let size = tool
            .measure_excluding(Path::new("/home"), Path::new("/home/Library"))
            .unwrap();
        assert_eq!(size, 800);
    }

    #[test]
    fn test_measure_excluding_missing_exclude_is_zero() {
        let tool = sizes(&[("/home", 800)]);
        let size = tool
            .measure_excluding(Path::new("/home"), Path::new("/home/Library"))
            .unwrap();
        assert_eq!(size, 800);
    }

    #[test]
    fn test_du_missing_path_is_not_found() {
        let tool = DuTool::default();
        let err = tool
            .measure(Path::new("/definitely/not/here/4f1c"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[cfg(unix)]
    #[test]
    fn test_du_measures_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("data.bin"), vec![7u8; 64 * 1024]).unwrap();

        let size = DuTool::default().measure(temp.path()).unwrap();
        assert!(size > 0);
        assert_eq!(size % 1024, 0);
    }
}
