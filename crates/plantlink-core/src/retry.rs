//! Fixed-delay retry policy for blocking bring-up steps.

use embedded_hal::delay::DelayNs;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    delay_ms: u32,
    max_attempts: Option<u32>,
}

/// Returned once a capped policy runs out of attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    /// Retries without limit, waiting `delay_ms` between attempts.
    pub const fn forever(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            max_attempts: None,
        }
    }

    /// Caps the total number of attempts (the first one included).
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub const fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay to wait after `failures` consecutive failures, or `None` when
    /// no attempt is left.
    pub fn next_delay_ms(&self, failures: u32) -> Option<u32> {
        match self.max_attempts {
            Some(max) if failures >= max => None,
            _ => Some(self.delay_ms),
        }
    }

    /// Calls `attempt` with the number of failures so far until it succeeds
    /// or the policy gives up.
    pub fn run<T, E, D, F>(&self, delay: &mut D, mut attempt: F) -> Result<T, RetryExhausted<E>>
    where
        D: DelayNs,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut failures = 0u32;
        loop {
            match attempt(failures) {
                Ok(value) => return Ok(value),
                Err(last_error) => {
                    failures = failures.saturating_add(1);
                    let Some(delay_ms) = self.next_delay_ms(failures) else {
                        return Err(RetryExhausted {
                            attempts: failures,
                            last_error,
                        });
                    };
                    delay.delay_ms(delay_ms);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingDelay {
        waits_ms: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.waits_ms.push(ms);
        }
    }

    #[test]
    fn forever_keeps_waiting_the_same_delay() {
        let policy = RetryPolicy::forever(300);
        let mut delay = RecordingDelay::default();

        let result: Result<u32, RetryExhausted<()>> =
            policy.run(&mut delay, |failures| if failures < 5 { Err(()) } else { Ok(failures) });

        assert_eq!(result, Ok(5));
        assert_eq!(delay.waits_ms, [300; 5]);
    }

    #[test]
    fn capped_policy_reports_the_last_error() {
        let policy = RetryPolicy::forever(0).with_max_attempts(3);
        let mut delay = RecordingDelay::default();

        let result: Result<(), _> = policy.run(&mut delay, |failures| Err(failures));

        assert_eq!(
            result,
            Err(RetryExhausted {
                attempts: 3,
                last_error: 2
            })
        );
        assert_eq!(delay.waits_ms, [0, 0]);
    }

    #[test]
    fn success_on_first_attempt_never_waits() {
        let policy = RetryPolicy::forever(300);
        let mut delay = RecordingDelay::default();

        let result: Result<&str, RetryExhausted<()>> = policy.run(&mut delay, |_| Ok("up"));

        assert_eq!(result, Ok("up"));
        assert!(delay.waits_ms.is_empty());
    }

    #[test]
    fn next_delay_stops_at_the_cap() {
        let policy = RetryPolicy::forever(250).with_max_attempts(2);
        assert_eq!(policy.next_delay_ms(1), Some(250));
        assert_eq!(policy.next_delay_ms(2), None);
        assert_eq!(RetryPolicy::forever(250).next_delay_ms(u32::MAX), Some(250));
    }
}
