//! Core types and traits for spacesift.
//!
//! This crate provides the data structures shared by the sizing engine and
//! its front ends: scan candidates, results, configuration, errors, and the
//! bounded top-N tracker.

mod config;
mod entry;
mod error;
mod result;
mod top_n;

pub use config::{ScanConfig, ScanConfigBuilder, ScanConfigBuilderError};
pub use entry::{DirEntry, FileEntry, Measured};
pub use error::{ScanError, ToolError};
pub use result::ScanResult;
pub use top_n::BoundedTopN;
