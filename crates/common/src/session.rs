//! Persisted browser session (cookies + per-origin localStorage)
//!
//! Uses the Playwright storage-state JSON shape so files captured by other
//! tooling stay interchangeable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Cookie `SameSite` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix seconds; `-1` for a session cookie.
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

fn default_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl StorageCookie {
    pub fn is_session(&self) -> bool {
        self.expires < 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<NameValue>,
}

/// Authenticated session captured from a browser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<StorageCookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

impl StorageState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the state as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(
            "Saved storage state ({} cookies, {} origins)",
            self.cookies.len(),
            self.origins.len()
        );
        debug!("Storage state written to {}", path.display());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_playwright_storage_file() {
        let raw = r#"{
            "cookies": [
                {"name":"sid","value":"abc","domain":".example.test","path":"/",
                 "expires":-1,"httpOnly":true,"secure":true,"sameSite":"Lax"}
            ],
            "origins": [
                {"origin":"https://example.test","localStorage":[{"name":"k","value":"v"}]}
            ]
        }"#;
        let state: StorageState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.cookies.len(), 1);
        assert!(state.cookies[0].is_session());
        assert!(state.cookies[0].http_only);
        assert_eq!(state.cookies[0].same_site, Some(SameSite::Lax));
        assert_eq!(state.origins[0].local_storage[0].value, "v");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let state = StorageState {
            cookies: vec![StorageCookie {
                name: "sid".into(),
                value: "1".into(),
                domain: "example.test".into(),
                path: "/".into(),
                expires: 1_900_000_000.0,
                http_only: false,
                secure: true,
                same_site: None,
            }],
            origins: vec![],
        };
        state.save(&path).unwrap();
        assert_eq!(StorageState::load(&path).unwrap(), state);
    }

    #[test]
    fn load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = StorageState::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
