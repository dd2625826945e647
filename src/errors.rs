//! Error hierarchy for the watch/source primitives.
//!
//! Errors are grouped by the layer that produces them: the broadcast core
//! ([`WatchError`]), the polling collaborator ([`PollError`]), the retry
//! helper ([`RetryError`]) and configuration loading.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Misuse of a closed Watchable or Source
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Failures reported by a `Pollable`
    #[error(transparent)]
    Poll(#[from] PollError),

    /// Retry helper outcomes that are not errors of the task itself
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// Settings loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// The Watchable (or the Source owning it) has been closed
    #[error("watchable is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Terminal signal: the source will never produce another value
    #[error("source closed")]
    SourceClosed,

    /// Transient failure described by a message
    #[error("poll failed: {0}")]
    Transient(String),

    /// Transient failure carrying the underlying error
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    /// The continue condition refused another attempt
    #[error("retry while condition evaluated to false")]
    WhileConditionFalse,

    /// A single attempt exceeded the per-attempt timeout
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl PollError {
    /// Whether this is the terminal end-of-data signal rather than a
    /// transient failure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollError::SourceClosed)
    }
}

impl Error {
    /// Whether the retry helper may try again after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Watch(_) => false,
            Error::Poll(e) => !e.is_terminal(),
            Error::Retry(RetryError::WhileConditionFalse) => false,
            Error::Retry(RetryError::Timeout(_)) => true,
            Error::Config(_) => false,
        }
    }
}
