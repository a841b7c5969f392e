//! Scripted in-memory page for driving the automation run in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use slotbot_common::{Error, Result, StorageState};
use slotbot_runner::{BrowserPage, SelectBy};

#[derive(Default)]
struct State {
    elements: HashMap<String, usize>,
    broken: HashSet<String>,
    options: HashMap<String, Vec<(String, String)>>,
    failing_gotos: HashSet<usize>,
    goto_calls: usize,
    failing_waits: HashSet<usize>,
    wait_calls: usize,
    console_on_goto: Vec<String>,
    console: Vec<String>,
    count_calls: HashMap<String, usize>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    selections: Vec<(String, SelectBy, String)>,
    screenshots: Vec<String>,
    applied: Option<StorageState>,
    url: Option<String>,
}

#[derive(Default)]
pub struct MockPage {
    state: Mutex<State>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` elements match `selector`.
    pub fn with_elements(self, selector: &str, n: usize) -> Self {
        self.state.lock().elements.insert(selector.to_string(), n);
        self
    }

    /// Every query or action on `selector` errors.
    pub fn with_broken(self, selector: &str) -> Self {
        self.state.lock().broken.insert(selector.to_string());
        self
    }

    /// A `<select>` at `selector` with `(label, value)` options.
    pub fn with_select(self, selector: &str, options: &[(&str, &str)]) -> Self {
        {
            let mut s = self.state.lock();
            s.elements.insert(selector.to_string(), 1);
            s.options.insert(
                selector.to_string(),
                options
                    .iter()
                    .map(|(l, v)| (l.to_string(), v.to_string()))
                    .collect(),
            );
        }
        self
    }

    /// The `n`-th navigation (zero-based) fails.
    pub fn failing_goto(self, n: usize) -> Self {
        self.state.lock().failing_gotos.insert(n);
        self
    }

    /// The `n`-th `wait_for_selector` call (zero-based) times out.
    pub fn failing_wait(self, n: usize) -> Self {
        self.state.lock().failing_waits.insert(n);
        self
    }

    /// Console line emitted on every navigation.
    pub fn console_on_goto(self, line: &str) -> Self {
        self.state.lock().console_on_goto.push(line.to_string());
        self
    }

    pub fn set_elements(&self, selector: &str, n: usize) {
        self.state.lock().elements.insert(selector.to_string(), n);
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().fills.clone()
    }

    pub fn selections(&self) -> Vec<(String, SelectBy, String)> {
        self.state.lock().selections.clone()
    }

    pub fn screenshots(&self) -> Vec<String> {
        self.state.lock().screenshots.clone()
    }

    pub fn count_calls(&self, selector: &str) -> usize {
        self.state.lock().count_calls.get(selector).copied().unwrap_or(0)
    }

    pub fn goto_calls(&self) -> usize {
        self.state.lock().goto_calls
    }

    pub fn applied_state(&self) -> Option<StorageState> {
        self.state.lock().applied.clone()
    }

    fn present(&self, selector: &str) -> Result<usize> {
        let s = self.state.lock();
        if s.broken.contains(selector) {
            return Err(Error::Browser(format!("query {} crashed", selector)));
        }
        Ok(s.elements.get(selector).copied().unwrap_or(0))
    }
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let mut s = self.state.lock();
        let call = s.goto_calls;
        s.goto_calls += 1;
        let lines = s.console_on_goto.clone();
        s.console.extend(lines);
        if s.failing_gotos.contains(&call) {
            return Err(Error::timeout(format!("navigation to {}", url), timeout));
        }
        s.url = Some(url.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.state.lock().url.clone())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        *self
            .state
            .lock()
            .count_calls
            .entry(selector.to_string())
            .or_insert(0) += 1;
        self.present(selector)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if self.present(selector)? == 0 {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        self.state.lock().clicks.push(selector.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, by: SelectBy, value: &str) -> Result<()> {
        if self.present(selector)? == 0 {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        let mut s = self.state.lock();
        let matched = s
            .options
            .get(selector)
            .map(|opts| {
                opts.iter().any(|(label, v)| match by {
                    SelectBy::Label => label == value,
                    SelectBy::Value => v == value,
                })
            })
            .unwrap_or(false);
        if !matched {
            return Err(Error::ElementNotFound(format!("option {} {}", by, value)));
        }
        s.selections
            .push((selector.to_string(), by, value.to_string()));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let failing = {
            let mut s = self.state.lock();
            let call = s.wait_calls;
            s.wait_calls += 1;
            s.failing_waits.contains(&call)
        };
        if failing || self.present(selector)? == 0 {
            return Err(Error::timeout(selector, timeout));
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        if self.present(selector)? == 0 {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        self.state
            .lock()
            .fills
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        std::fs::write(path, b"\x89PNG")?;
        self.state
            .lock()
            .screenshots
            .push(path.display().to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok("<html><body>mock</body></html>".to_string())
    }

    async fn apply_storage_state(&self, state: &StorageState) -> Result<()> {
        self.state.lock().applied = Some(state.clone());
        Ok(())
    }

    async fn storage_state(&self) -> Result<StorageState> {
        Ok(self.state.lock().applied.clone().unwrap_or_default())
    }

    fn drain_console(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().console)
    }
}
