use std::time::Duration;

use rand::Rng;

use crate::BackoffPolicy;

/// Exponentially growing delay sequence derived from a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current_ms: f64,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current_ms: policy.base_delay_ms as f64,
        }
    }

    /// Returns the delay to wait before the next attempt and advances the
    /// sequence.
    pub fn next_delay(&mut self) -> Duration {
        let mut delay_ms = self.current_ms;
        if self.policy.jitter {
            let half = delay_ms / 2.0;
            delay_ms = half + rand::thread_rng().gen::<f64>() * half;
        }
        let delay_ms = delay_ms.min(self.policy.max_delay_ms as f64);

        // Stop growing once past the cap so the product stays finite.
        if self.current_ms < self.policy.max_delay_ms as f64 {
            self.current_ms *= self.policy.backoff_factor;
        }

        Duration::from_millis(delay_ms as u64)
    }

    /// Restart from `base_delay_ms`.
    pub fn reset(&mut self) {
        self.current_ms = self.policy.base_delay_ms as f64;
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}
