//! Bounded concurrent fetch-and-aggregate pipeline.
//!
//! - `Dispatcher` runs one task per item behind a semaphore and honors a
//!   `CancellationToken` at admission.
//! - `ResultCollector` drains the outcome channel and partitions outcomes
//!   into records and per-item failures.
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(10, cancel.clone());
//! let rx = dispatcher.dispatch(applications, move |app| fetch(app));
//! let collected = ResultCollector::new(rx).run().await;
//! ```

mod collector;
mod dispatcher;
mod types;

pub use collector::{Collected, ResultCollector};
pub use dispatcher::Dispatcher;
pub use types::{ItemErrors, ItemFailure, ItemOutcome, Outcome, TaskPanicked, WorkItem};

/// Default admission ceiling for remote fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
