//! Browser page abstraction
//!
//! The automation run talks to the browser only through [`BrowserPage`], so
//! the flow can be exercised against a scripted page in tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use slotbot_common::{Result, StorageState};

/// How an `<option>` is matched when selecting from a dropdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectBy {
    /// Visible option text
    Label,
    /// The option's `value` attribute
    Value,
}

impl std::fmt::Display for SelectBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectBy::Label => write!(f, "label"),
            SelectBy::Value => write!(f, "value"),
        }
    }
}

/// One open browser page
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the document to load, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Reload the current document.
    async fn reload(&self) -> Result<()>;

    /// URL of the current document, if known.
    async fn current_url(&self) -> Result<Option<String>>;

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.count(selector).await? > 0)
    }

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Choose an option of the `<select>` matching `selector`. Fails when no
    /// option matches `value`.
    async fn select_option(&self, selector: &str, by: SelectBy, value: &str) -> Result<()>;

    /// Wait until `selector` matches a visible, enabled element.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Replace the value of the input matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Save a PNG of the viewport to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;

    /// Install cookies and localStorage from a saved session.
    async fn apply_storage_state(&self, state: &StorageState) -> Result<()>;

    /// Capture cookies and the current origin's localStorage.
    async fn storage_state(&self) -> Result<StorageState>;

    /// Take the console lines (`"<type>: <text>"`) collected since the last call.
    fn drain_console(&self) -> Vec<String>;
}
