//! `control.json`: pause / resume / force flags shared between the control
//! server and a running automation.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::ControlState;

/// Action name written by `/force`.
pub const FORCE_ACTION: &str = "force";

/// Read the control file. A missing or malformed file reads as the default
/// (not paused, no action).
pub fn read_control(path: &Path) -> ControlState {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) => return ControlState::default(),
    };
    serde_json::from_str(&data).unwrap_or_else(|e| {
        warn!("Ignoring malformed control file");
        debug!("{}: {}", path.display(), e);
        ControlState::default()
    })
}

pub fn write_control(path: &Path, state: &ControlState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(state)?)?;
    Ok(())
}

/// Read-modify-write helper; stamps `at` with the current time.
pub fn update_control<F>(path: &Path, f: F) -> Result<ControlState>
where
    F: FnOnce(&mut ControlState),
{
    let mut state = read_control(path);
    f(&mut state);
    state.at = Some(Utc::now());
    write_control(path, &state)?;
    Ok(state)
}

/// Clear a pending `force` action. Returns whether one was pending.
pub fn take_force(path: &Path) -> Result<bool> {
    let state = read_control(path);
    if state.action.as_deref() != Some(FORCE_ACTION) {
        return Ok(false);
    }
    update_control(path, |s| s.action = None)?;
    Ok(true)
}
