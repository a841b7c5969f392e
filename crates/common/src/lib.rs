//! slotbot common library
//!
//! Data model, file layout and on-disk formats shared by the automation
//! runner, the control server and the CLI.

pub mod artifacts;
pub mod config;
pub mod control;
pub mod error;
pub mod progress;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::{ClientSelection, ProjectLayout};
pub use error::{Error, Result};
pub use progress::Progress;
pub use session::StorageState;
pub use types::*;

/// slotbot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
