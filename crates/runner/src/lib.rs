//! slotbot runner
//!
//! Drives the appointment site through a browser page: the per-client
//! booking flow behind `fill-clients`, and the interactive session capture
//! used by `slotbot login`.

pub mod capture;
pub mod chromium;
pub mod driver;
pub mod poll;
pub mod run;
pub mod timing;

pub use chromium::{default_chrome_path, ChromiumSession, LaunchOptions};
pub use driver::{BrowserPage, SelectBy};
pub use poll::{poll_for_slots, PollOutcome};
pub use run::{FillRun, NO_SLOTS_MESSAGE, QUERY_FAILED_MESSAGE};
pub use timing::{Jitter, RunTimings};
