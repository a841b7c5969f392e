//! The automation run: one sequential pass over the selected clients.
//!
//! Each client gets a fresh run directory and exactly one `result.json`.
//! Step failures are recorded on the result; anything else that goes wrong
//! while driving the page is caught per client, dumped as `error.html` plus
//! `console.log`, and the run moves on to the next client.

use std::path::Path;

use chrono::Utc;
use slotbot_common::artifacts::{self, RunDir, FILLED_SCREENSHOT, RECEIPT_SCREENSHOT};
use slotbot_common::control;
use slotbot_common::{
    ClientRecord, Error, LastStatus, Progress, ProjectLayout, Result, RunResult, SiteConfig,
};
use tracing::{debug, error, info, warn};

use crate::driver::{BrowserPage, SelectBy};
use crate::poll::{poll_for_slots, PollOutcome};
use crate::timing::{Jitter, RunTimings};

pub const NO_SLOTS_MESSAGE: &str = "no slots found";
pub const QUERY_FAILED_MESSAGE: &str = "slot query failed";

/// A configured automation run
pub struct FillRun {
    config: SiteConfig,
    layout: ProjectLayout,
    timings: RunTimings,
}

impl FillRun {
    pub fn new(config: SiteConfig, layout: ProjectLayout) -> Self {
        Self {
            config,
            layout,
            timings: RunTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: RunTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Process every selected client in order and return their results.
    ///
    /// Fails before touching any client when no target URL is configured.
    pub async fn run(
        &self,
        page: &dyn BrowserPage,
        clients: &[(usize, ClientRecord)],
    ) -> Result<Vec<RunResult>> {
        let target = self
            .config
            .target_url()
            .ok_or_else(|| Error::InvalidConfig("config.json needs checkUrl or baseUrl".into()))?
            .to_string();

        info!("{}", Progress::RunStarted(clients.len()));
        let mut results = Vec::with_capacity(clients.len());
        for (index, client) in clients {
            self.wait_while_paused().await;
            results.push(self.process_client(page, &target, *index, client).await);
        }

        let completed = results.iter().filter(|r| r.success).count();
        info!(
            "{}",
            Progress::RunFinished {
                completed,
                total: results.len()
            }
        );
        Ok(results)
    }

    async fn wait_while_paused(&self) {
        let path = self.layout.control_path();
        let mut announced = false;
        while control::read_control(&path).paused {
            if !announced {
                info!("Paused by operator; waiting for resume");
                announced = true;
            }
            tokio::time::sleep(self.timings.pause_recheck).await;
        }
        if announced {
            info!("Resumed");
        }
    }

    /// Run the whole flow for one client and persist its result.
    ///
    /// Never fails: a run directory that cannot be created or written is
    /// logged and the returned result carries the error.
    pub async fn process_client(
        &self,
        page: &dyn BrowserPage,
        target: &str,
        index: usize,
        client: &ClientRecord,
    ) -> RunResult {
        let mut result = RunResult::begin(index, client.clone());
        let run_dir = match RunDir::create(&self.layout.fill_runs_dir(), index, Utc::now()) {
            Ok(dir) => dir,
            Err(e) => {
                error!("{}", Progress::ResultNotSaved(index));
                debug!("Run directory for client {}: {}", index, e);
                result.fail_with_error(e.to_string());
                return result;
            }
        };

        // Console lines belong to the client that produced them.
        let _ = page.drain_console();

        if let Err(e) = self.drive(page, target, &run_dir, client, &mut result).await {
            error!("{}", Progress::ClientFailed(index));
            debug!("Client {} error: {}", index, e);
            result.fail_with_error(e.to_string());
            match page.content().await {
                Ok(html) => {
                    if let Err(e) = run_dir.write_error_html(&html) {
                        warn!("Could not write error.html");
                        debug!("error.html: {}", e);
                    }
                }
                Err(e) => debug!("Could not capture page HTML: {}", e),
            }
            if let Err(e) = run_dir.write_console_log(&page.drain_console()) {
                warn!("Could not write console.log");
                debug!("console.log: {}", e);
            }
        }

        match run_dir.write_result(&result) {
            Ok(path) => debug!("Wrote {}", path.display()),
            Err(e) => {
                error!("{}", Progress::ResultNotSaved(index));
                debug!("Writing result for client {}: {}", index, e);
                return result;
            }
        }
        self.record_last_status(&run_dir, &result);

        // Outcome lines go out only once last_status.json points at this run.
        if result.success {
            if result.receipt_screenshot.is_some() {
                info!("{}", Progress::ReceiptCaptured(index));
            }
            if result.book_clicked == Some(true) {
                info!("{}", Progress::BookingSubmitted(index));
            } else {
                info!("{}", Progress::FormFilled(index));
            }
        }
        result
    }

    fn record_last_status(&self, run_dir: &RunDir, result: &RunResult) {
        let screenshot = [RECEIPT_SCREENSHOT, FILLED_SCREENSHOT]
            .iter()
            .map(|name| run_dir.file(name))
            .find(|p| p.is_file())
            .and_then(|p| self.layout.output_relative(&p));
        let status = LastStatus {
            run_dir: self
                .layout
                .output_relative(run_dir.path())
                .unwrap_or_else(|| run_dir.path().display().to_string()),
            screenshot,
            client_index: result.client_index,
            success: result.success,
            message: result.message.clone().or_else(|| result.error.clone()),
            finished_at: result.finished_at.unwrap_or_else(Utc::now),
        };
        if let Err(e) = artifacts::write_last_status(&self.layout.last_status_path(), &status) {
            warn!("Could not write last status");
            debug!("last_status.json: {}", e);
        }
    }

    async fn drive(
        &self,
        page: &dyn BrowserPage,
        target: &str,
        run_dir: &RunDir,
        client: &ClientRecord,
        result: &mut RunResult,
    ) -> Result<()> {
        let index = result.client_index;
        let selectors = &self.config.selectors;

        info!("{}", Progress::OpeningPage(index));
        debug!("Target URL {}", target);
        page.goto(target, self.timings.navigation_timeout).await?;

        self.pre_steps(page).await;

        if let Some(slot_sel) = selectors.slot_list() {
            info!("{}", Progress::CheckingAvailability(index));
            let control = self.layout.control_path();
            match poll_for_slots(page, slot_sel, &self.timings, Some(&control)).await {
                PollOutcome::Found(n) => info!("{}", Progress::SlotsAvailable(index, n)),
                PollOutcome::NoSlots => {
                    info!("{}", Progress::NoSlots(index));
                    result.fail_with_message(NO_SLOTS_MESSAGE);
                    return Ok(());
                }
                PollOutcome::QueryFailed { error } => {
                    warn!("{}", Progress::QueryFailed(index));
                    debug!("Slot query error: {}", error);
                    result.error = Some(error);
                    result.fail_with_message(QUERY_FAILED_MESSAGE);
                    return Ok(());
                }
            }
        }

        self.fill_form(page, client).await?;

        let filled = run_dir.file(FILLED_SCREENSHOT);
        page.screenshot(&filled).await?;
        result.filled_screenshot = Some(filled.display().to_string());

        if let Some(book) = selectors.book_button() {
            match page.click(book).await {
                Ok(()) => {
                    tokio::time::sleep(self.timings.after_click).await;
                    result.book_clicked = Some(true);
                }
                Err(e) => {
                    warn!("{}", Progress::BookClickFailed(index));
                    debug!("Book click: {}", e);
                    result.book_clicked = Some(false);
                    result.book_error = Some(e.to_string());
                }
            }
        }

        if let Some(confirm) = selectors.confirm_button() {
            if self.config.pause_before_confirm {
                info!("{}", Progress::ConfirmHeld(index));
                result.confirmed = Some(false);
            } else {
                match page.click(confirm).await {
                    Ok(()) => {
                        tokio::time::sleep(self.timings.after_click).await;
                        result.confirmed = Some(true);
                    }
                    Err(e) => {
                        warn!("{}", Progress::ConfirmClickFailed(index));
                        debug!("Confirm click: {}", e);
                        result.confirmed = Some(false);
                        result.confirm_error = Some(e.to_string());
                    }
                }
            }
        }

        if let Some(receipt) = selectors.receipt() {
            self.capture_receipt(page, receipt, run_dir, result).await;
        }

        result.succeed();
        Ok(())
    }

    /// Start click and dropdown selections. Each is optional and a failure
    /// only gets logged.
    async fn pre_steps(&self, page: &dyn BrowserPage) {
        let selectors = &self.config.selectors;

        if let Some(start) = selectors.start_booking() {
            match page.exists(start).await {
                Ok(true) => match page.click(start).await {
                    Ok(()) => pause(self.timings.after_start_click).await,
                    Err(e) => {
                        warn!("{}", Progress::StartClickFailed);
                        debug!("Start click: {}", e);
                    }
                },
                Ok(false) => debug!("Start element {} not on page", start),
                Err(e) => {
                    warn!("{}", Progress::StartClickFailed);
                    debug!("Start element lookup: {}", e);
                }
            }
        }

        let form_data = &self.config.form_data;
        let dropdowns = [
            ("center", selectors.center_select(), form_data.center()),
            ("service", selectors.service_select(), form_data.service()),
        ];
        for (what, selector, value) in dropdowns {
            let (Some(selector), Some(value)) = (selector, value) else {
                continue;
            };
            match page.exists(selector).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("{} dropdown {} not on page", what, selector);
                    continue;
                }
                Err(e) => {
                    warn!("{}", Progress::DropdownFailed(what));
                    debug!("{} dropdown lookup: {}", what, e);
                    continue;
                }
            }
            let chosen = match page.select_option(selector, SelectBy::Label, value).await {
                Ok(()) => Ok(()),
                Err(_) => page.select_option(selector, SelectBy::Value, value).await,
            };
            if let Err(e) = chosen {
                warn!("{}", Progress::DropdownFailed(what));
                debug!("Selecting {} {:?}: {}", what, value, e);
            }
            pause(self.timings.after_select).await;
        }
    }

    async fn fill_form(&self, page: &dyn BrowserPage, client: &ClientRecord) -> Result<()> {
        let form = &self.config.selectors.form;
        let fields = [
            (form.name(), client.full_name()),
            (form.phone(), client.phone().map(str::to_string)),
            (form.email(), client.email().map(str::to_string)),
        ];
        for (selector, value) in fields {
            if let (Some(selector), Some(value)) = (selector, value) {
                page.wait_for_selector(selector, self.timings.field_timeout)
                    .await?;
                page.fill(selector, &value).await?;
                debug!("Filled {}", selector);
            }
        }
        Ok(())
    }

    async fn capture_receipt(
        &self,
        page: &dyn BrowserPage,
        selector: &str,
        run_dir: &RunDir,
        result: &mut RunResult,
    ) {
        let shot = run_dir.file(RECEIPT_SCREENSHOT);
        let captured = match page
            .wait_for_selector(selector, self.timings.receipt_timeout)
            .await
        {
            Ok(()) => page.screenshot(&shot).await,
            Err(e) => Err(e),
        };
        match captured {
            Ok(()) => {
                debug!("Saved {}", shot.display());
                result.receipt_screenshot = Some(shot.display().to_string());
            }
            Err(e) => {
                warn!("{}", Progress::FinalPageMissing(result.client_index));
                debug!("Final page: {}", e);
                result.receipt_error = Some(e.to_string());
            }
        }
    }
}

async fn pause(jitter: Jitter) {
    tokio::time::sleep(jitter.sample()).await;
}

/// Load a saved session into the page, if the file parses.
pub async fn apply_session(page: &dyn BrowserPage, storage: &Path) -> Result<()> {
    let state = slotbot_common::StorageState::load(storage)?;
    page.apply_storage_state(&state).await?;
    info!("Saved session loaded");
    debug!("Session file {}", storage.display());
    Ok(())
}
