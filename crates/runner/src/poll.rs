//! Availability poll: re-count the slot selector until something shows up.

use std::path::Path;
use std::time::Instant;

use slotbot_common::control;
use tracing::{debug, info, warn};

use crate::driver::BrowserPage;
use crate::timing::RunTimings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// At least one slot element matched
    Found(usize),
    /// The poll window elapsed with zero matches
    NoSlots,
    /// Too many queries in a row failed; carries the last error
    QueryFailed { error: String },
}

/// Poll `selector` with the configured jittered interval.
///
/// A pending `force` action in the control file (when `control_path` is
/// given) is consumed and skips the sleep, re-querying at once.
pub async fn poll_for_slots(
    page: &dyn BrowserPage,
    selector: &str,
    timings: &RunTimings,
    control_path: Option<&Path>,
) -> PollOutcome {
    let started = Instant::now();
    let mut failures = 0u32;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match page.count(selector).await {
            Ok(n) if n > 0 => {
                debug!("Slot query matched {} element(s) after {} attempt(s)", n, attempts);
                return PollOutcome::Found(n);
            }
            Ok(_) => failures = 0,
            Err(e) => {
                failures += 1;
                warn!("Slot query failed ({}/{})", failures, timings.max_query_failures);
                debug!("Slot query: {}", e);
                if failures >= timings.max_query_failures {
                    return PollOutcome::QueryFailed {
                        error: e.to_string(),
                    };
                }
            }
        }

        if started.elapsed() >= timings.poll_timeout {
            return PollOutcome::NoSlots;
        }

        if let Some(path) = control_path {
            match control::take_force(path) {
                Ok(true) => {
                    info!("Forced re-check requested");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not read control file");
                    debug!("Control file: {}", e);
                }
            }
        }

        tokio::time::sleep(timings.poll_interval.sample()).await;
    }
}
