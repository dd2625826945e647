//! Latest-value broadcast fed by a background poller.
//!
//! A [`Source`] repeatedly polls a [`Pollable`] on its own task and stores
//! each value in a [`Watchable`]. Any number of consumers subscribe through
//! [`Source::watch`] and get woken when a newer value is available; slow
//! consumers see bursts of updates coalesced into one wake and always read
//! the freshest value with [`Watch::get`].
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use pollwatch::{PollError, Pollable, Source};
//!
//! struct Clock;
//!
//! #[async_trait]
//! impl Pollable<u64> for Clock {
//!     async fn poll(&mut self) -> Result<u64, PollError> {
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!         Ok(42)
//!     }
//! }
//!
//! # async fn run() -> pollwatch::Result<()> {
//! let source: Source<u64> = Source::new(Clock, tracing::info_span!("clock"));
//! let (_, mut watch) = source.watch()?;
//! while watch.changed().await {
//!     println!("now: {:?}", watch.get());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod errors;
mod source;
mod watch;
pub mod metrics;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use source::*;
pub use utils::*;
pub use watch::*;
