//! # Fibonacci Backoff
//!
//! Delays between retries of a failed page fetch. The sequence grows more
//! slowly than exponential backoff: with a 250ms base and a 4s cap it goes
//! 250ms, 250ms, 500ms, 750ms, 1.25s, 2s, 3.25s, 4s.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_millis: u64,
    current_millis: u64,
    max_millis: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and never exceeding `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_millis = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        Self {
            prev_millis: 0,
            current_millis: min_millis,
            max_millis,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_millis;

        let next = self.prev_millis.saturating_add(self.current_millis);
        self.prev_millis = self.current_millis;
        self.current_millis = std::cmp::min(next, self.max_millis);

        Duration::from_millis(result)
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(4))
    }
}
