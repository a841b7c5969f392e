//! Locating the newest run outcome and screenshot under `bot-output/`

use serde_json::{json, Map, Value};
use slotbot_common::artifacts::{
    find_latest_screenshot, latest_run_result, read_last_status, FILLED_SCREENSHOT,
    RECEIPT_SCREENSHOT,
};
use slotbot_common::ProjectLayout;

/// URL prefix under which `bot-output/` is served
pub const FILES_PREFIX: &str = "/files";

fn files_url(relative: &str) -> String {
    format!("{}/{}", FILES_PREFIX, relative.trim_start_matches('/'))
}

/// Newest screenshot as a `/files/...` URL: the one named in
/// `last_status.json` first, otherwise the newest PNG of any run.
pub fn latest_screenshot_url(layout: &ProjectLayout) -> Option<String> {
    if let Some(shot) = read_last_status(&layout.last_status_path()).and_then(|s| s.screenshot) {
        return Some(files_url(&shot));
    }
    let path = find_latest_screenshot(&layout.fill_runs_dir())?;
    layout.output_relative(&path).map(|rel| files_url(&rel))
}

/// Body of `GET /last-result`.
pub fn last_result(layout: &ProjectLayout) -> Value {
    if let Some(status) = read_last_status(&layout.last_status_path()) {
        let mut result = serde_json::to_value(&status).unwrap_or_else(|_| json!({}));
        if let (Some(obj), Some(shot)) = (result.as_object_mut(), status.screenshot.as_deref()) {
            obj.insert("screenshotPath".into(), Value::String(files_url(shot)));
        }
        return json!({ "ok": true, "source": "last_status", "result": result });
    }

    if let Some((dir, value)) = latest_run_result(&layout.fill_runs_dir()) {
        let mut result = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".into(), other);
                map
            }
        };
        if let Some(rel) = layout.output_relative(&dir) {
            result.insert("runDir".into(), Value::String(rel));
        }
        let shot = [RECEIPT_SCREENSHOT, FILLED_SCREENSHOT]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
            .and_then(|p| layout.output_relative(&p));
        if let Some(shot) = shot {
            result.insert("screenshotPath".into(), Value::String(files_url(&shot)));
        }
        return json!({ "ok": true, "source": "latest-run", "result": result });
    }

    json!({
        "ok": true,
        "source": "none",
        "result": { "status": "offline", "message": "No results yet" }
    })
}
