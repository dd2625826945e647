//! Background polling driver feeding a [`Watchable`](crate::Watchable).

mod polling_source;

pub use polling_source::*;


//---
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::PollError;

/// Supplies the values a [`Source`] broadcasts.
///
/// `poll` is never called concurrently for one source. Returning
/// [`PollError::SourceClosed`] ends the source for good; any other error is
/// logged and the source polls again. Pacing and cancellation of a single
/// call are up to the implementation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Pollable<T>: Send + 'static
where
    T: Send + 'static,
{
    async fn poll(&mut self) -> std::result::Result<T, PollError>;
}
