//! Waits and timeouts of the booking flow

use std::time::Duration;

use rand::Rng;

/// A base delay plus a uniformly random extra in `[0, spread)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub base: Duration,
    pub spread: Duration,
}

impl Jitter {
    pub const ZERO: Jitter = Jitter::from_millis(0, 0);

    pub const fn from_millis(base: u64, spread: u64) -> Self {
        Self {
            base: Duration::from_millis(base),
            spread: Duration::from_millis(spread),
        }
    }

    pub fn sample(&self) -> Duration {
        let spread = self.spread.as_millis() as u64;
        if spread == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
    }
}

#[derive(Debug, Clone)]
pub struct RunTimings {
    pub navigation_timeout: Duration,
    pub after_start_click: Jitter,
    pub after_select: Jitter,
    pub poll_timeout: Duration,
    pub poll_interval: Jitter,
    /// Consecutive failed slot queries that end the poll early.
    pub max_query_failures: u32,
    pub field_timeout: Duration,
    pub after_click: Duration,
    pub receipt_timeout: Duration,
    /// How often a paused run re-reads the control file.
    pub pause_recheck: Duration,
}

impl Default for RunTimings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            after_start_click: Jitter::from_millis(800, 800),
            after_select: Jitter::from_millis(600, 600),
            poll_timeout: Duration::from_secs(60),
            poll_interval: Jitter::from_millis(2000, 800),
            max_query_failures: 10,
            field_timeout: Duration::from_secs(30),
            after_click: Duration::from_secs(1),
            receipt_timeout: Duration::from_secs(8),
            pause_recheck: Duration::from_secs(2),
        }
    }
}

impl RunTimings {
    /// Near-zero waits, for driving the flow against a scripted page.
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(500),
            after_start_click: Jitter::ZERO,
            after_select: Jitter::ZERO,
            poll_timeout: Duration::from_millis(40),
            poll_interval: Jitter::from_millis(5, 0),
            max_query_failures: 10,
            field_timeout: Duration::from_millis(50),
            after_click: Duration::ZERO,
            receipt_timeout: Duration::from_millis(50),
            pause_recheck: Duration::from_millis(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_range() {
        let j = Jitter::from_millis(2000, 800);
        for _ in 0..200 {
            let d = j.sample();
            assert!(d >= Duration::from_millis(2000));
            assert!(d < Duration::from_millis(2800));
        }
        assert_eq!(Jitter::ZERO.sample(), Duration::ZERO);
    }

    #[test]
    fn defaults_match_site_pacing() {
        let t = RunTimings::default();
        assert_eq!(t.navigation_timeout, Duration::from_secs(60));
        assert_eq!(t.poll_timeout, Duration::from_secs(60));
        assert_eq!(t.field_timeout, Duration::from_secs(30));
        assert_eq!(t.receipt_timeout, Duration::from_secs(8));
        assert_eq!(t.after_start_click, Jitter::from_millis(800, 800));
        assert_eq!(t.after_select, Jitter::from_millis(600, 600));
    }
}
