//! Project layout and configuration loading
//!
//! Every file the workspace reads or writes lives under one root directory
//! (the working directory of the binaries). `ProjectLayout` is the single
//! place those paths are spelled out.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{ClientRecord, SiteConfig};

/// Preferred storage-state file name
pub const PLAYWRIGHT_STORAGE_FILE: &str = "playwright-storage.json";
/// Storage-state file written by the interactive login
pub const STATE_FILE: &str = "state.json";

/// Well-known locations under the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at the current directory.
    pub fn current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn clients_path(&self) -> PathBuf {
        self.root.join("clients.json")
    }

    /// `bot-output/`, served under `/files` by the control server.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("bot-output")
    }

    pub fn fill_runs_dir(&self) -> PathBuf {
        self.output_dir().join("fill-runs")
    }

    pub fn activity_log_path(&self) -> PathBuf {
        self.output_dir().join("bot.log")
    }

    pub fn last_status_path(&self) -> PathBuf {
        self.output_dir().join("last_status.json")
    }

    pub fn control_path(&self) -> PathBuf {
        self.root.join("control.json")
    }

    /// Storage-state files in order of preference.
    pub fn storage_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.root.join(PLAYWRIGHT_STORAGE_FILE),
            self.root.join(STATE_FILE),
        ]
    }

    /// First existing storage-state file, if any.
    pub fn find_storage_state(&self) -> Option<PathBuf> {
        self.storage_candidates().into_iter().find(|p| p.is_file())
    }

    /// Express `path` relative to the output directory with forward slashes,
    /// the way `/files/...` URLs address it.
    pub fn output_relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(self.output_dir()).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// Path of another binary installed next to the running one.
pub fn sibling_executable(name: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.with_file_name(format!("{}{}", name, std::env::consts::EXE_SUFFIX)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let data = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&data).map_err(|e| {
        Error::InvalidConfig(format!("{}: {}", path.display(), e))
    })?;
    debug!("Loaded {}", path.display());
    Ok(value)
}

/// Load `config.json`.
pub fn load_site_config(path: &Path) -> Result<SiteConfig> {
    read_json(path)
}

/// Load `clients.json`, a JSON array of client records.
pub fn load_clients(path: &Path) -> Result<Vec<ClientRecord>> {
    read_json(path)
}

/// Which clients a run processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientSelection {
    /// Every configured client, in file order
    All,
    /// One client by zero-based position
    Index(usize),
    /// The first client only
    #[default]
    First,
}

impl ClientSelection {
    /// Resolve the selection against the loaded clients, keeping each
    /// record's original index.
    pub fn select(&self, clients: &[ClientRecord]) -> Result<Vec<(usize, ClientRecord)>> {
        if clients.is_empty() {
            return Err(Error::InvalidConfig("clients.json has no clients".into()));
        }
        match *self {
            ClientSelection::All => Ok(clients.iter().cloned().enumerate().collect()),
            ClientSelection::First => Ok(vec![(0, clients[0].clone())]),
            ClientSelection::Index(index) => match clients.get(index) {
                Some(client) => Ok(vec![(index, client.clone())]),
                None => Err(Error::ClientIndexOutOfRange {
                    index,
                    len: clients.len(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn clients(n: usize) -> Vec<ClientRecord> {
        (0..n)
            .map(|i| ClientRecord {
                first_name: Some(format!("client{i}")),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn selection_keeps_original_indices() {
        let all = ClientSelection::All.select(&clients(3)).unwrap();
        let indices: Vec<usize> = all.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let one = ClientSelection::Index(2).select(&clients(3)).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].0, 2);
        assert_eq!(one[0].1.first_name.as_deref(), Some("client2"));

        let first = ClientSelection::default().select(&clients(3)).unwrap();
        assert_eq!(first[0].0, 0);
    }

    #[test]
    fn selection_out_of_range_is_an_error() {
        let err = ClientSelection::Index(5).select(&clients(2)).unwrap_err();
        assert!(matches!(err, Error::ClientIndexOutOfRange { index: 5, len: 2 }));
        assert!(ClientSelection::All.select(&[]).is_err());
    }

    #[test]
    fn storage_state_prefers_playwright_file() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(layout.find_storage_state().is_none());

        std::fs::write(dir.path().join(STATE_FILE), "{}").unwrap();
        assert_eq!(layout.find_storage_state(), Some(dir.path().join(STATE_FILE)));

        std::fs::write(dir.path().join(PLAYWRIGHT_STORAGE_FILE), "{}").unwrap();
        assert_eq!(
            layout.find_storage_state(),
            Some(dir.path().join(PLAYWRIGHT_STORAGE_FILE))
        );
    }

    #[test]
    fn missing_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let err = load_site_config(&layout.config_path()).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn loads_clients_array() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        std::fs::write(
            layout.clients_path(),
            r#"[{"firstName":"Ana","email":"a@x.test"},{"firstName":"Rui"}]"#,
        )
        .unwrap();
        let loaded = load_clients(&layout.clients_path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].email(), Some("a@x.test"));
    }

    #[test]
    fn output_relative_uses_forward_slashes() {
        let layout = ProjectLayout::new("/srv/bot");
        let shot = layout.fill_runs_dir().join("run-client-0").join("filled.png");
        assert_eq!(
            layout.output_relative(&shot).as_deref(),
            Some("fill-runs/run-client-0/filled.png")
        );
        assert_eq!(layout.output_relative(Path::new("/elsewhere/x.png")), None);
    }
}
