//! Single-value, versioned broadcast.
//!
//! A [`Watchable`] holds the latest value and a set of registered wake
//! channels. Every [`Watch`] owns the receiving end of one channel with a
//! capacity of one slot: an update fills the slot if it is empty and is
//! dropped otherwise, so a consumer that has not drained yet sees a burst
//! of updates as a single wake. Consumers must re-read [`Watch::get`] on
//! each wake instead of assuming one wake per update.
//!
//! Closing drops every registered sender, which ends each consumer's wake
//! stream. A `Watch` only keeps a weak reference to its `Watchable` and
//! removes its own registration on [`Watch::close`] or drop.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::Result;
use crate::WatchError;

/// Wake slots per watch. One slot is what makes bursts coalesce.
const WAKE_CAPACITY: usize = 1;

struct State<T> {
    value: Option<T>,
    version: u64,
    watches: HashMap<u64, mpsc::Sender<()>>,
    next_watch_id: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    fn unregister(
        &self,
        id: u64,
    ) {
        self.state.lock().watches.remove(&id);
    }

    fn version(&self) -> u64 {
        self.state.lock().version
    }
}

impl<T: Clone> Shared<T> {
    fn get(&self) -> Option<T> {
        self.state.lock().value.clone()
    }
}

/// Latest-value holder with broadcast wake-up.
pub struct Watchable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Watchable<T> {
    /// Creates an empty Watchable at version 0.
    pub fn new() -> Self {
        Self::from_state(None, 0)
    }

    /// Creates a Watchable holding `value` at version 1.
    pub fn with_value(value: T) -> Self {
        Self::from_state(Some(value), 1)
    }

    fn from_state(
        value: Option<T>,
        version: u64,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    value,
                    version,
                    watches: HashMap::new(),
                    next_watch_id: 0,
                    closed: false,
                }),
            }),
        }
    }

    /// Number of updates applied, plus one if an initial value was given.
    pub fn version(&self) -> u64 {
        self.shared.version()
    }

    /// Stores `value` as version `version + 1` and wakes every registered
    /// watch. Fails once the Watchable is closed.
    pub fn update(
        &self,
        value: T,
    ) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(WatchError::Closed.into());
        }

        state.value = Some(value);
        state.version += 1;
        trace!(version = state.version, watches = state.watches.len(), "watchable updated");

        for wake_tx in state.watches.values() {
            // Full means a wake is already pending for that watch.
            let _ = wake_tx.try_send(());
        }
        Ok(())
    }

    /// Closes the Watchable and ends the wake stream of every registered
    /// watch. The last value stays readable. Calling it again is a no-op.
    pub fn close(&self) {
        self.try_close();
    }

    /// Closes the Watchable, returning whether this call did it.
    pub(crate) fn try_close(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        trace!(watches = state.watches.len(), "watchable closed");
        state.watches.clear();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn num_watches(&self) -> usize {
        self.shared.state.lock().watches.len()
    }
}

impl<T: Clone> Watchable<T> {
    /// Current value, `None` until the first update.
    pub fn get(&self) -> Option<T> {
        self.shared.get()
    }

    /// Registers a new watch and returns it with the value current at
    /// registration time.
    pub fn watch(&self) -> Result<(Option<T>, Watch<T>)> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(WatchError::Closed.into());
        }

        let id = state.next_watch_id;
        state.next_watch_id += 1;

        let (wake_tx, wake_rx) = mpsc::channel(WAKE_CAPACITY);
        state.watches.insert(id, wake_tx);

        let watch = Watch {
            id,
            owner: Arc::downgrade(&self.shared),
            wake_rx,
            last_seen_version: state.version,
            closed: AtomicBool::new(false),
        };
        Ok((state.value.clone(), watch))
    }
}

impl<T> Default for Watchable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer's subscription to a [`Watchable`].
///
/// Wakes are observed through [`Watch::changed`] or by iterating the watch
/// as a [`Stream`]. Either ends for good once the watch or its Watchable is
/// closed.
pub struct Watch<T> {
    id: u64,
    owner: Weak<Shared<T>>,
    wake_rx: mpsc::Receiver<()>,
    last_seen_version: u64,
    closed: AtomicBool,
}

impl<T: Clone> Watch<T> {
    /// Current value of the owning Watchable at call time.
    pub fn get(&self) -> Option<T> {
        self.owner.upgrade().and_then(|shared| shared.get())
    }
}

impl<T> Watch<T> {
    /// Waits for the next wake. Returns `false` once the wake stream has
    /// ended.
    pub async fn changed(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.wake_rx.recv().await {
            Some(()) if !self.is_closed() => {
                self.observe();
                true
            }
            _ => false,
        }
    }

    fn observe(&mut self) {
        if let Some(shared) = self.owner.upgrade() {
            let version = shared.version();
            let skipped = version.saturating_sub(self.last_seen_version + 1);
            if skipped > 0 {
                trace!(watch = self.id, version, skipped, "coalesced updates");
            }
            self.last_seen_version = version;
        }
    }

    /// Stops this watch from being woken. Safe to call repeatedly and
    /// concurrently with updates or with closing the Watchable.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.owner.upgrade() {
            shared.unregister(self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T> Stream for Watch<T> {
    type Item = ();

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<()>> {
        let this = self.get_mut();
        if this.is_closed() {
            return Poll::Ready(None);
        }
        match this.wake_rx.poll_recv(cx) {
            Poll::Ready(Some(())) if !this.is_closed() => {
                this.observe();
                Poll::Ready(Some(()))
            }
            Poll::Ready(_) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Watch<T> {
    fn drop(&mut self) {
        self.close();
    }
}
