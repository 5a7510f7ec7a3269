//! Resubscription backoff for the live path.
//!
//! Doubles on each failed attempt up to a cap and resets when data
//! flows again. There is no attempt ceiling: resubscription is
//! indefinite, since a dropped subscription is an operational hiccup,
//! not a fatal condition.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SubscribeBackoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl SubscribeBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, attempt: 0 }
    }

    /// The delay to wait before the next resubscription attempt.
    pub fn next(&mut self) -> Duration {
        let exp = self.attempt.min(16); // avoid shift overflow
        let delay = self
            .initial
            .saturating_mul(1u32 << exp)
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Call when the subscription delivered an item again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
