//! slotbot control panel
//!
//! Supervises one `fill-clients` child process, classifies its output into a
//! friendly status and serves a small HTTP API plus a static status page.

pub mod classify;
pub mod logbook;
pub mod results;
pub mod server;
pub mod supervisor;

pub use classify::{classify_output, Classification};
pub use logbook::ActivityLog;
pub use server::{ControlServer, ServerConfig};
pub use supervisor::{Outcome, ProcessStatus, Supervisor, SupervisorConfig};
