use serde::Deserialize;

use super::BackoffPolicy;

/// Poll loop behaviour of a [`Source`](crate::Source).
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct SourceConfig {
    /// Pause between consecutive transient poll errors.
    ///
    /// `None` retries immediately; pacing is then entirely up to the
    /// pollable.
    #[serde(default)]
    pub error_backoff: Option<BackoffPolicy>,
}
