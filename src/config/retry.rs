use std::time::Duration;

use serde::Deserialize;

/// Exponential backoff template shared by the retry helper and the
/// source's transient-error pacing.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Retry without bound; overrides `max_retries`
    #[serde(default)]
    pub forever: bool,

    /// Single attempt timeout (unit: milliseconds, 0 disables it)
    #[serde(default)]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay after every retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomize each delay into `[d/2, d)`
    #[serde(default)]
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            forever: false,
            timeout_ms: 0,
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub(crate) fn validate(
        &self,
        section: &str,
    ) -> std::result::Result<(), String> {
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return Err(format!(
                "{section}.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(format!(
                "{section}.max_delay_ms ({}) is smaller than base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ));
        }
        Ok(())
    }
}

fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_max_delay_ms() -> u64 {
    1000
}
