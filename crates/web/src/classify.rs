//! Heuristic reading of the automation's stdout.
//!
//! All wording the supervisor reacts to lives here. Matching is
//! case-insensitive and covers both the English log lines of `fill-clients`
//! and Portuguese wording from the site itself.

use once_cell::sync::Lazy;
use regex::Regex;

pub const IDLE_MESSAGE: &str = "No activity yet";
pub const STARTING_MESSAGE: &str = "Starting booking run...";
pub const CHECKING_MESSAGE: &str = "Checking availability...";
pub const SLOT_FOUND_MESSAGE: &str = "Slot found!";
pub const NO_SLOTS_MESSAGE: &str = "No slots available right now";
pub const STOPPING_MESSAGE: &str = "Stopping bot...";

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("classification patterns are valid")
}

static STARTING: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)iniciando|starting|abrindo"));
static CHECKING: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)verificando|checking|checando"));
static SLOT: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)success|recibo|receipt|booking|agendado|confirmado"));
static NO_SLOTS: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)no slots|sem vagas|não há vagas|nao ha vagas|no availability"));

/// What one line of output means for the process status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// New `lastMessage`
    pub message: String,
    /// `Some(true)` slot indicator, `Some(false)` no-slots indicator,
    /// `None` leaves `hasSlot` alone
    pub has_slot: Option<bool>,
}

impl Classification {
    pub fn slot_detected(&self) -> bool {
        self.has_slot == Some(true)
    }
}

/// Classify one stdout line. A no-slots match wins over a slot match.
pub fn classify_output(line: &str) -> Classification {
    let text = line.trim();
    let mut message = if STARTING.is_match(text) {
        STARTING_MESSAGE.to_string()
    } else if CHECKING.is_match(text) {
        CHECKING_MESSAGE.to_string()
    } else {
        text.to_string()
    };
    let mut has_slot = None;

    if SLOT.is_match(text) {
        has_slot = Some(true);
        message = SLOT_FOUND_MESSAGE.to_string();
    }
    if NO_SLOTS.is_match(text) {
        has_slot = Some(false);
        message = NO_SLOTS_MESSAGE.to_string();
    }

    Classification { message, has_slot }
}

/// `lastMessage` after the child exits.
pub fn exit_message(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("Bot stopped (exit {})", code),
        None => "Bot stopped".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbot_common::Progress;

    #[test]
    fn start_and_check_wording() {
        assert_eq!(classify_output("Starting run for 2 client(s)").message, STARTING_MESSAGE);
        assert_eq!(classify_output("Abrindo browser").message, STARTING_MESSAGE);
        assert_eq!(
            classify_output("INFO Client 0: checking availability").message,
            CHECKING_MESSAGE
        );
        assert_eq!(classify_output("Verificando vagas").has_slot, None);
    }

    #[test]
    fn other_lines_become_the_message() {
        let c = classify_output("  Client 1: opening https://site.test  ");
        assert_eq!(c.message, "Client 1: opening https://site.test");
        assert_eq!(c.has_slot, None);
    }

    #[test]
    fn slot_words_set_has_slot() {
        for line in [
            "Client 0: booking submitted",
            "Client 0: receipt captured",
            "Agendamento CONFIRMADO",
            "success: true",
        ] {
            let c = classify_output(line);
            assert!(c.slot_detected(), "{line}");
            assert_eq!(c.message, SLOT_FOUND_MESSAGE);
        }
    }

    #[test]
    fn no_slots_wins() {
        for line in [
            "Client 3: no slots found",
            "Sem vagas disponíveis",
            "Não há vagas",
            "nao ha vagas",
            "No availability for booking",
        ] {
            let c = classify_output(line);
            assert_eq!(c.has_slot, Some(false), "{line}");
            assert_eq!(c.message, NO_SLOTS_MESSAGE);
        }
    }

    #[test]
    fn runner_progress_only_signals_slots_on_outcomes() {
        let lines = [
            Progress::RunStarted(2),
            Progress::OpeningPage(0),
            Progress::CheckingAvailability(0),
            Progress::SlotsAvailable(0, 3),
            Progress::QueryFailed(0),
            Progress::StartClickFailed,
            Progress::DropdownFailed("center"),
            Progress::DropdownFailed("service"),
            Progress::BookClickFailed(0),
            Progress::ConfirmHeld(0),
            Progress::ConfirmClickFailed(0),
            Progress::FinalPageMissing(0),
            Progress::ClientFailed(0),
            Progress::ResultNotSaved(0),
            Progress::FormFilled(0),
            Progress::RunFinished {
                completed: 1,
                total: 2,
            },
        ];
        for line in lines {
            let text = format!("2026-01-01T00:00:00Z WARN {}", line);
            assert_eq!(classify_output(&text).has_slot, None, "{text}");
        }

        for line in [Progress::ReceiptCaptured(1), Progress::BookingSubmitted(1)] {
            assert!(line.is_outcome());
            assert!(classify_output(&line.to_string()).slot_detected(), "{line}");
        }
        assert_eq!(classify_output(&Progress::NoSlots(1).to_string()).has_slot, Some(false));
    }

    #[test]
    fn exit_wording() {
        assert_eq!(exit_message(Some(0)), "Bot stopped (exit 0)");
        assert_eq!(exit_message(None), "Bot stopped");
    }
}
