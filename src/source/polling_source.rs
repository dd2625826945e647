//! A [`Source`] owns one [`Watchable`] and the single task that feeds it.
//!
//! ## Lifecycle
//! - `running`: entered at construction, the poll task starts immediately
//! - `closed`: terminal, entered on [`Source::close`] or when the pollable
//!   returns [`PollError::SourceClosed`]
//!
//! Closing never interrupts a poll that is already in flight. The loop
//! notices the closed state once that call returns, drops its value, and
//! exits without polling again.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;
use tracing::Instrument;
use tracing::Span;

use super::Pollable;
use crate::async_task::spawn_task;
use crate::backoff::Backoff;
use crate::metrics::SOURCE_POLL_ERRORS;
use crate::PollError;
use crate::Result;
use crate::SourceConfig;
use crate::Watch;
use crate::Watchable;

pub struct Source<T> {
    watchable: Arc<Watchable<T>>,
    // Flips to `true` when the poll task exits; a dropped sender means the
    // task is gone as well.
    poll_done: watch::Receiver<bool>,
    span: Span,
}

impl<T> Source<T>
where
    T: Clone + Send + 'static,
{
    /// Starts polling right away. Transient poll errors are reported inside
    /// `span`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime, since the poll task is
    /// spawned immediately.
    pub fn new<P>(
        pollable: P,
        span: Span,
    ) -> Self
    where
        P: Pollable<T>,
    {
        Self::with_config(pollable, span, SourceConfig::default())
    }

    /// Like [`Source::new`], with error pacing taken from `config`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_config<P>(
        pollable: P,
        span: Span,
        config: SourceConfig,
    ) -> Self
    where
        P: Pollable<T>,
    {
        let watchable = Arc::new(Watchable::new());
        let poll_loop = PollLoop {
            pollable,
            watchable: watchable.clone(),
            error_backoff: config.error_backoff.map(Backoff::new),
        };
        let (done_tx, poll_done) = watch::channel(false);
        let poll_task = async move {
            let result = poll_loop.run().await;
            let _ = done_tx.send(true);
            result
        };
        spawn_task("source_poll_loop", poll_task.instrument(span.clone()));

        Self {
            watchable,
            poll_done,
            span,
        }
    }

    /// Subscribes to updates. Fails with `WatchError::Closed` once the
    /// source is closed.
    pub fn watch(&self) -> Result<(Option<T>, Watch<T>)> {
        self.watchable.watch()
    }

    /// Latest polled value; keeps returning the last one after close.
    pub fn get(&self) -> Option<T> {
        self.watchable.get()
    }
}

impl<T> Source<T> {
    pub fn version(&self) -> u64 {
        self.watchable.version()
    }

    pub fn is_closed(&self) -> bool {
        self.watchable.is_closed()
    }

    /// Stops polling and closes every watch. Always succeeds; repeated or
    /// concurrent calls are harmless.
    pub fn close(&self) -> Result<()> {
        if self.watchable.try_close() {
            info!(parent: &self.span, "source closed");
        }
        Ok(())
    }

    /// Waits for the poll task to exit. After [`Source::close`] this
    /// returns once the in-flight poll, if any, has completed. Any number of
    /// callers may wait at the same time.
    pub async fn join(&self) {
        let mut poll_done = self.poll_done.clone();
        if poll_done.wait_for(|done| *done).await.is_err() {
            debug!(parent: &self.span, "poll task dropped without signalling completion");
        }
    }
}

impl<T> Drop for Source<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct PollLoop<P, T> {
    pollable: P,
    watchable: Arc<Watchable<T>>,
    error_backoff: Option<Backoff>,
}

impl<P, T> PollLoop<P, T>
where
    P: Pollable<T>,
    T: Clone + Send + 'static,
{
    async fn run(mut self) -> Result<()> {
        debug!("poll loop started");

        while !self.watchable.is_closed() {
            match self.pollable.poll().await {
                Ok(value) => {
                    if let Some(backoff) = self.error_backoff.as_mut() {
                        backoff.reset();
                    }
                    if let Err(e) = self.watchable.update(value) {
                        debug!("dropping value polled during close: {}", e);
                    }
                }
                Err(PollError::SourceClosed) => {
                    if self.watchable.try_close() {
                        info!("pollable signalled end of data, source closed");
                    }
                }
                Err(e) => {
                    SOURCE_POLL_ERRORS.inc();
                    warn!("poll failed: {}", e);
                    if let Some(backoff) = self.error_backoff.as_mut() {
                        sleep(backoff.next_delay()).await;
                    }
                }
            }
        }

        debug!("poll loop stopped");
        Ok(())
    }
}
