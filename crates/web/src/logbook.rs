//! Append-only activity log (`bot-output/bot.log`)

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use tracing::warn;

/// Timestamped, line-oriented log shared by the supervisor and the API
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `"<ISO timestamp> <line>"`. Failures are logged, never raised.
    pub fn append(&self, line: &str) {
        let _guard = self.write_lock.lock();
        if let Err(e) = self.write_line(line) {
            warn!("Activity log append failed: {}", e);
        }
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            line
        )
    }

    /// Last `lines` non-empty lines, or `None` when there is no log yet.
    pub fn tail(&self, lines: usize) -> std::io::Result<Option<String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let all: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        let start = all.len().saturating_sub(lines);
        Ok(Some(all[start..].join("\n")))
    }

    /// Delete the log. Returns whether there was one.
    pub fn clear(&self) -> std::io::Result<bool> {
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
