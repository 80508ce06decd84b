//! Fixed-interval gate for the publish cycle.

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Fires when it has never fired, or when strictly more than the interval
/// has passed since it last fired.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollScheduler {
    interval_ms: u64,
    last_fired_ms: Option<u64>,
}

impl PollScheduler {
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fired_ms: None,
        }
    }

    pub const fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub const fn last_fired_ms(&self) -> Option<u64> {
        self.last_fired_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_fired_ms
            .is_none_or(|last| now_ms.saturating_sub(last) > self.interval_ms)
    }

    /// Returns true and records `now_ms` when the gate opens.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.is_due(now_ms) {
            return false;
        }
        self.last_fired_ms = Some(now_ms);
        true
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_immediately_when_never_fired() {
        let mut scheduler = PollScheduler::default();
        assert!(scheduler.poll(0));
        assert_eq!(scheduler.last_fired_ms(), Some(0));
    }

    #[test]
    fn fires_once_after_five_five_and_one_seconds() {
        let mut scheduler = PollScheduler::default();
        let mut now_ms = 0u64;
        assert!(scheduler.poll(now_ms));

        let mut fired = Vec::new();
        for advance_ms in [5_000, 5_000, 1_000] {
            now_ms += advance_ms;
            fired.push(scheduler.poll(now_ms));
        }

        assert_eq!(fired, [false, false, true]);
        assert_eq!(scheduler.last_fired_ms(), Some(11_000));
    }

    #[test]
    fn exactly_one_interval_is_not_enough() {
        let mut scheduler = PollScheduler::new(10_000);
        assert!(scheduler.poll(2_000));
        assert!(!scheduler.poll(12_000));
        assert!(scheduler.poll(12_001));
    }

    #[test]
    fn late_ticks_fire_once_and_rearm_from_the_late_time() {
        let mut scheduler = PollScheduler::new(10_000);
        assert!(scheduler.poll(0));
        assert!(scheduler.poll(45_000));
        assert!(!scheduler.poll(50_000));
        assert!(scheduler.poll(55_001));
    }

    #[test]
    fn clock_going_backwards_does_not_fire() {
        let mut scheduler = PollScheduler::new(10_000);
        assert!(scheduler.poll(20_000));
        assert!(!scheduler.poll(5_000));
    }
}
