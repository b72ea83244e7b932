//! spacesift - Find what is taking up disk space.
//!
//! Usage:
//!   spacesift scan [PATH]        Largest children and files under PATH
//!   spacesift overview PATH      Total size of PATH only
//!   spacesift --help             Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use spacesift_scan::{
    JsonFileCache, MemoryCache, OverviewSizeCache, ScanConfig, ScanProgress, ScanResult,
    SizeScanner,
};

/// Access age below which nothing is shown.
const UNUSED_AFTER_DAYS: u64 = 90;

#[derive(Parser)]
#[command(
    name = "spacesift",
    version,
    about = "Find what is taking up disk space",
    long_about = "spacesift sizes every immediate child of a directory in parallel, \
                  using actual disk usage, and lists the largest files found on the way.\n\n\
                  Set RUST_LOG=spacesift=debug for detailed logs."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Size the immediate children of a directory
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Number of children to show
        #[arg(short = 'n', long, default_value = "30")]
        entries: usize,

        /// Number of large files to show
        #[arg(short = 'l', long, default_value = "30")]
        large_files: usize,

        /// Minimum size of a large file (e.g., "100MB", "1GB")
        #[arg(short, long, default_value = "100MB")]
        min_size: String,

        /// Fixed number of worker threads (default: derived from CPU count)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Measure the total size of one directory
    Overview {
        /// Absolute directory path
        path: PathBuf,

        /// Do not read or write the on-disk size cache
        #[arg(long)]
        no_cache: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spacesift=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            path,
            json,
            entries,
            large_files,
            min_size,
            workers,
        } => {
            let config = ScanConfig::builder()
                .max_entries(entries)
                .max_large_files(large_files)
                .min_large_file_size(parse_size(&min_size)?)
                .workers(workers)
                .build()
                .context("Invalid scan options")?;
            run_scan(&path, config, json)?;
        }
        Command::Overview { path, no_cache } => {
            run_overview(&path, no_cache)?;
        }
    }

    Ok(())
}

/// Run a scan and print the largest children and files.
fn run_scan(path: &Path, config: ScanConfig, json: bool) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let cache = open_cache(&config);
    let home = config.home_dir.clone();
    let scanner = SizeScanner::new(config).with_cache(cache);

    let progress = if json {
        None
    } else {
        eprintln!("Scanning {}...", path.display());
        let rx = scanner.subscribe();
        Some(thread::spawn(move || show_progress(rx)))
    };

    let result = scanner.scan(&path);
    // Closes the progress channel.
    drop(scanner);
    if let Some(progress) = progress {
        let _ = progress.join();
    }
    let result = result.context("Scan failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, home.as_deref());
    }

    Ok(())
}

/// Measure one directory and print its size.
fn run_overview(path: &Path, no_cache: bool) -> Result<()> {
    let config = ScanConfig::default();
    let cache: Arc<dyn OverviewSizeCache> = if no_cache {
        Arc::new(MemoryCache::new())
    } else {
        open_cache(&config)
    };
    let scanner = SizeScanner::new(config).with_cache(cache);

    let size = scanner
        .measure_overview_size(path)
        .with_context(|| format!("Cannot measure {}", path.display()))?;
    println!("{}\t{}", format_size(size), path.display());

    Ok(())
}

/// Open the persistent overview cache, or an in-memory one without a home.
fn open_cache(config: &ScanConfig) -> Arc<dyn OverviewSizeCache> {
    match config.home_dir.as_deref() {
        Some(home) => {
            let file = home.join(".cache").join("spacesift").join("overview.json");
            Arc::new(JsonFileCache::open(file, Some(JsonFileCache::DEFAULT_TTL)))
        }
        None => Arc::new(MemoryCache::with_ttl(JsonFileCache::DEFAULT_TTL)),
    }
}

/// Print live scan progress on one stderr line until the scanner is dropped.
fn show_progress(mut rx: broadcast::Receiver<ScanProgress>) {
    let mut shown = false;
    loop {
        match rx.blocking_recv() {
            Ok(progress) => {
                eprint!("\r{}    ", progress_line(&progress));
                shown = true;
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    if shown {
        eprintln!();
    }
}

fn progress_line(progress: &ScanProgress) -> String {
    format!(
        " {} items, {:.0} files/s, {}/s",
        progress.total_items(),
        progress.files_per_second(),
        format_size(progress.bytes_per_second() as u64)
    )
}

fn print_result(result: &ScanResult, home: Option<&Path>) {
    println!();
    println!("{}", "─".repeat(70));
    println!(
        " {} - {}",
        display_path(&result.root, home),
        format_size(result.total_size)
    );
    println!(
        " {} files, {} directories",
        result.files_scanned, result.dirs_scanned
    );
    println!(" Scanned in {:.2}s", result.scan_duration.as_secs_f64());
    println!("{}", "─".repeat(70));
    println!();

    if result.is_empty() {
        println!(" Nothing to report.");
        return;
    }

    let now = SystemTime::now();
    for entry in &result.entries {
        let ratio = if result.total_size > 0 {
            entry.size as f64 / result.total_size as f64
        } else {
            0.0
        };
        let dir_marker = if entry.is_dir && !entry.is_link() { "/" } else { "" };
        println!(
            " {:<40} {:>10} {:>5.1}% {} {:>6}",
            truncate(&format!("{}{}", entry.name, dir_marker), 40),
            format_size(entry.size),
            ratio * 100.0,
            make_bar(ratio, 10),
            format_unused_time(entry.last_access, now)
        );
    }

    if !result.large_files.is_empty() {
        println!();
        println!(" Large files:");
        for file in &result.large_files {
            println!(
                "   {:>10}  {}",
                format_size(file.size),
                display_path(&file.path, home)
            );
        }
    }
    println!();
}

/// Show `path` with the home directory replaced by `~`.
fn display_path(path: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| path.strip_prefix(home).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

/// How long ago an entry was last used, or empty if it was used recently.
fn format_unused_time(last_access: Option<SystemTime>, now: SystemTime) -> String {
    let Some(days) = last_access
        .and_then(|at| now.duration_since(at).ok())
        .map(|age| age.as_secs() / 86_400)
    else {
        return String::new();
    };
    if days < UNUSED_AFTER_DAYS {
        return String::new();
    }

    let years = days / 365;
    let months = days / 30;
    if years >= 2 {
        format!(">{years}yr")
    } else if years >= 1 {
        ">1yr".to_string()
    } else if months >= 3 {
        format!(">{months}mo")
    } else {
        String::new()
    }
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio * width as f64).round() as usize).min(width);
    let empty = width - filled;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Parse a size string (e.g., "512", "1KB", "10MB", "1.5GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(digits_end);

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024 * 1024 * 1024 * 1024,
        other => bail!("Unknown size unit: {other}"),
    };
    let num: f64 = num
        .parse()
        .with_context(|| format!("Invalid size: {s}"))?;

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const DAY: u64 = 86_400;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("100mb").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_size("1.5G").unwrap(), 1536 * 1024 * 1024);
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_format_unused_time() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(3_000 * DAY);
        let ago = |days: u64| Some(now - Duration::from_secs(days * DAY));

        assert_eq!(format_unused_time(None, now), "");
        assert_eq!(format_unused_time(ago(10), now), "");
        assert_eq!(format_unused_time(ago(89), now), "");
        assert_eq!(format_unused_time(ago(90), now), ">3mo");
        assert_eq!(format_unused_time(ago(200), now), ">6mo");
        assert_eq!(format_unused_time(ago(400), now), ">1yr");
        assert_eq!(format_unused_time(ago(365 * 3 + 5), now), ">3yr");
        // Access times in the future are treated as recent.
        assert_eq!(format_unused_time(Some(now + Duration::from_secs(DAY)), now), "");
    }

    #[test]
    fn test_progress_line() {
        let progress = ScanProgress {
            files_scanned: 90,
            dirs_scanned: 10,
            bytes_scanned: 2048 * 9,
            elapsed: Duration::from_secs(9),
            ..ScanProgress::new()
        };
        let line = progress_line(&progress);
        assert!(line.starts_with(" 100 items, 10 files/s, "), "{line}");
        assert!(line.ends_with("KiB/s"), "{line}");
    }

    #[test]
    fn test_display_path() {
        let home = Path::new("/home/u");
        assert_eq!(display_path(Path::new("/home/u/Music/a.flac"), Some(home)), "~/Music/a.flac");
        assert_eq!(display_path(home, Some(home)), "~");
        assert_eq!(display_path(Path::new("/home/user2/x"), Some(home)), "/home/user2/x");
        assert_eq!(display_path(Path::new("/tmp/x"), None), "/tmp/x");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
