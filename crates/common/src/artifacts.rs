//! Per-client run artifacts
//!
//! Layout of one run directory:
//!
//! ```text
//! bot-output/fill-runs/<timestamp>-client-<i>/
//!   result.json      always, written once when the client finishes
//!   filled.png       after the form fill
//!   receipt.png      when a receipt selector matched
//!   error.html       page HTML, only on an exception
//!   console.log      browser console lines, only on an exception
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::types::{LastStatus, RunResult};

pub const RESULT_FILE: &str = "result.json";
pub const FILLED_SCREENSHOT: &str = "filled.png";
pub const RECEIPT_SCREENSHOT: &str = "receipt.png";
pub const ERROR_HTML: &str = "error.html";
pub const CONSOLE_LOG: &str = "console.log";

/// ISO-8601 UTC timestamp with `:` and `.` replaced so it is path-safe.
pub fn timestamp_slug(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// A freshly created, never reused run directory
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Create `<base>/<timestamp>-client-<index>`. A name that already
    /// exists gets a `-1`, `-2`, ... suffix.
    pub fn create(base: &Path, client_index: usize, at: DateTime<Utc>) -> Result<Self> {
        std::fs::create_dir_all(base)?;
        let stem = format!("{}-client-{}", timestamp_slug(at), client_index);
        let mut candidate = base.join(&stem);
        let mut n = 0u32;
        loop {
            match std::fs::create_dir(&candidate) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    n += 1;
                    candidate = base.join(format!("{stem}-{n}"));
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!("Created run directory {}", candidate.display());
        Ok(Self { path: candidate })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn write_result(&self, result: &RunResult) -> Result<PathBuf> {
        let path = self.file(RESULT_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(result)?)?;
        Ok(path)
    }

    pub fn write_error_html(&self, html: &str) -> Result<PathBuf> {
        let path = self.file(ERROR_HTML);
        std::fs::write(&path, html)?;
        Ok(path)
    }

    pub fn write_console_log(&self, lines: &[String]) -> Result<PathBuf> {
        let path = self.file(CONSOLE_LOG);
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        std::fs::write(&path, body)?;
        Ok(path)
    }
}

// ============================================================================
// Latest status
// ============================================================================

pub fn write_last_status(path: &Path, status: &LastStatus) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(status)?)?;
    Ok(())
}

/// `None` when the file is missing or unreadable.
pub fn read_last_status(path: &Path) -> Option<LastStatus> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(status) => Some(status),
        Err(e) => {
            warn!("Ignoring malformed last status file");
            debug!("{}: {}", path.display(), e);
            None
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Newest `*.png` anywhere under the fill-runs directory.
pub fn find_latest_screenshot(fill_runs: &Path) -> Option<PathBuf> {
    WalkDir::new(fill_runs)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|x| x == "png").unwrap_or(false))
        .filter_map(|e| modified(e.path()).map(|t| (t, e.into_path())))
        .max()
        .map(|(_, path)| path)
}

/// Newest run directory holding a `result.json`, with the parsed result.
pub fn latest_run_result(fill_runs: &Path) -> Option<(PathBuf, serde_json::Value)> {
    let (_, dir) = WalkDir::new(fill_runs)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| {
            let result = e.path().join(RESULT_FILE);
            modified(&result).map(|t| (t, e.into_path()))
        })
        .max()?;
    let data = std::fs::read_to_string(dir.join(RESULT_FILE)).ok()?;
    let value = serde_json::from_str(&data).ok()?;
    Some((dir, value))
}
