//! Core types for slotbot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Treat a missing or blank string as "not configured".
fn configured(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// One applicant to submit. Identity is the position in `clients.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Fields the form flow does not use; echoed back into results.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientRecord {
    /// "first last", trimmed. `None` when both parts are missing or blank.
    pub fn full_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    pub fn phone(&self) -> Option<&str> {
        configured(&self.phone)
    }

    pub fn email(&self) -> Option<&str> {
        configured(&self.email)
    }
}

/// Selectors of the applicant form fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSelectors {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl FormSelectors {
    pub fn name(&self) -> Option<&str> {
        configured(&self.name)
    }

    pub fn phone(&self) -> Option<&str> {
        configured(&self.phone)
    }

    pub fn email(&self) -> Option<&str> {
        configured(&self.email)
    }
}

/// Page selectors driving the booking flow.
///
/// Every selector is optional: an absent or blank selector turns the
/// corresponding step into a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selectors {
    #[serde(default)]
    pub start_booking: Option<String>,
    #[serde(default)]
    pub center_select: Option<String>,
    #[serde(default)]
    pub service_select: Option<String>,
    #[serde(default)]
    pub slot_list: Option<String>,
    #[serde(default)]
    pub form: FormSelectors,
    #[serde(default)]
    pub book_button: Option<String>,
    #[serde(default)]
    pub confirm_button: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
}

impl Selectors {
    pub fn start_booking(&self) -> Option<&str> {
        configured(&self.start_booking)
    }

    pub fn center_select(&self) -> Option<&str> {
        configured(&self.center_select)
    }

    pub fn service_select(&self) -> Option<&str> {
        configured(&self.service_select)
    }

    pub fn slot_list(&self) -> Option<&str> {
        configured(&self.slot_list)
    }

    pub fn book_button(&self) -> Option<&str> {
        configured(&self.book_button)
    }

    pub fn confirm_button(&self) -> Option<&str> {
        configured(&self.confirm_button)
    }

    pub fn receipt(&self) -> Option<&str> {
        configured(&self.receipt)
    }
}

/// Values chosen in the pre-step dropdowns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

impl FormData {
    pub fn center(&self) -> Option<&str> {
        configured(&self.center)
    }

    pub fn service(&self) -> Option<&str> {
        configured(&self.service)
    }
}

/// Site configuration loaded from `config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub check_url: Option<String>,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub form_data: FormData,
    #[serde(default)]
    pub pause_before_confirm: bool,
}

impl SiteConfig {
    /// Page the run opens for every client: `checkUrl`, falling back to `baseUrl`.
    pub fn target_url(&self) -> Option<&str> {
        configured(&self.check_url).or_else(|| configured(&self.base_url))
    }

    /// Page opened for an interactive login.
    pub fn login_url(&self) -> &str {
        configured(&self.base_url).unwrap_or("about:blank")
    }
}

/// Outcome of processing one client, persisted as `result.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub client_index: usize,
    pub client: ClientRecord,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_clicked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_error: Option<String>,
}

impl RunResult {
    /// Fresh result for a client that is about to be processed.
    pub fn begin(client_index: usize, client: ClientRecord) -> Self {
        Self {
            client_index,
            client,
            started_at: Utc::now(),
            finished_at: None,
            success: false,
            message: None,
            error: None,
            book_clicked: None,
            book_error: None,
            confirmed: None,
            confirm_error: None,
            filled_screenshot: None,
            receipt_screenshot: None,
            receipt_error: None,
        }
    }

    pub fn succeed(&mut self) {
        self.success = true;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail_with_message(&mut self, message: impl Into<String>) {
        self.success = false;
        self.message = Some(message.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn fail_with_error(&mut self, error: impl Into<String>) {
        self.success = false;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

/// Operator control flags shared through `control.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// Pointer to the most recently finished client, `last_status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastStatus {
    pub run_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub client_index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub finished_at: DateTime<Utc>,
}
