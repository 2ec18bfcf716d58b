//! Working directory sweep
//!
//! Uploads, staged outputs and extractor scratch files all carry a known
//! prefix. A crash can leave them behind; [`sweep_work_dir`] removes the
//! ones older than a threshold.

use crate::error::Result;
use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Name prefixes of every temp file the bot creates
pub const TEMP_PREFIXES: &[&str] = &["upload-", "output-", "extract-"];

/// Outcome of a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files deleted
    pub removed: usize,
    /// Files that matched but could not be deleted
    pub failed: usize,
    /// Bytes reclaimed
    pub bytes: u64,
}

fn is_temp_name(name: &str) -> bool {
    TEMP_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Delete temp files in `dir` whose mtime is at least `min_age` old
///
/// Only regular files directly inside `dir` are considered. A missing
/// directory yields an empty report.
///
/// # Examples
///
/// ```
/// use image_utility_bot::janitor::sweep_work_dir;
/// use std::time::Duration;
///
/// let dir = tempfile::tempdir()?;
/// std::fs::write(dir.path().join("upload-1.jpg"), b"x")?;
/// std::fs::write(dir.path().join("keep.txt"), b"x")?;
///
/// let report = sweep_work_dir(dir.path(), Duration::ZERO)?;
/// assert_eq!(report.removed, 1);
/// assert!(dir.path().join("keep.txt").exists());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn sweep_work_dir(dir: &Path, min_age: Duration) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    if !dir.exists() {
        return Ok(report);
    }

    let now = SystemTime::now();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_temp_name(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let metadata = entry.metadata()?;
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or_default();
        if age < min_age {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                report.removed += 1;
                report.bytes += metadata.len();
                tracing::debug!(path = %entry.path().display(), "Swept orphaned file");
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(path = %entry.path().display(), "Failed to sweep file: {}", e);
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        removed = report.removed,
        failed = report.failed,
        bytes = report.bytes,
        "Swept working directory"
    );
    Ok(report)
}
