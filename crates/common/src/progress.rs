//! Progress lines printed by `fill-clients`.
//!
//! The control server reads these off the child's stdout and matches them
//! against slot wording, so they never carry selectors, URLs, paths or error
//! text. Details of a failure go to `result.json` and debug output.

use std::fmt;

/// One line of run progress, keyed by client index where it applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    RunStarted(usize),
    OpeningPage(usize),
    CheckingAvailability(usize),
    SlotsAvailable(usize, usize),
    NoSlots(usize),
    QueryFailed(usize),
    StartClickFailed,
    DropdownFailed(&'static str),
    BookClickFailed(usize),
    ConfirmHeld(usize),
    ConfirmClickFailed(usize),
    FinalPageMissing(usize),
    ClientFailed(usize),
    ResultNotSaved(usize),
    ReceiptCaptured(usize),
    BookingSubmitted(usize),
    FormFilled(usize),
    RunFinished { completed: usize, total: usize },
}

impl Progress {
    /// Lines that report a real booking outcome.
    pub fn is_outcome(&self) -> bool {
        matches!(self, Progress::ReceiptCaptured(_) | Progress::BookingSubmitted(_))
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::RunStarted(n) => write!(f, "Starting run for {} client(s)", n),
            Progress::OpeningPage(i) => write!(f, "Client {}: opening target page", i),
            Progress::CheckingAvailability(i) => write!(f, "Client {}: checking availability", i),
            Progress::SlotsAvailable(i, n) => write!(f, "Client {}: {} slot(s) available", i, n),
            Progress::NoSlots(i) => write!(f, "Client {}: no slots found", i),
            Progress::QueryFailed(i) => write!(f, "Client {}: slot query failed", i),
            Progress::StartClickFailed => write!(f, "Start step skipped"),
            Progress::DropdownFailed(what) => write!(f, "Could not select {}", what),
            Progress::BookClickFailed(i) => write!(f, "Client {}: book click failed", i),
            Progress::ConfirmHeld(i) => {
                write!(f, "Client {}: leaving confirmation for manual review", i)
            }
            Progress::ConfirmClickFailed(i) => write!(f, "Client {}: confirm click failed", i),
            Progress::FinalPageMissing(i) => write!(f, "Client {}: final page not captured", i),
            Progress::ClientFailed(i) => write!(f, "Client {}: failed, page saved", i),
            Progress::ResultNotSaved(i) => write!(f, "Client {}: result not saved", i),
            Progress::ReceiptCaptured(i) => write!(f, "Client {}: receipt captured", i),
            Progress::BookingSubmitted(i) => write!(f, "Client {}: booking submitted", i),
            Progress::FormFilled(i) => write!(f, "Client {}: form filled", i),
            Progress::RunFinished { completed, total } => {
                write!(f, "Run finished: {} of {} client(s) completed", completed, total)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_only_the_index() {
        assert_eq!(Progress::BookClickFailed(2).to_string(), "Client 2: book click failed");
        assert_eq!(
            Progress::RunFinished { completed: 1, total: 3 }.to_string(),
            "Run finished: 1 of 3 client(s) completed"
        );
        assert!(Progress::BookingSubmitted(0).is_outcome());
        assert!(!Progress::FormFilled(0).is_outcome());
    }
}
