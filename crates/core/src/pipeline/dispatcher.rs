//! Bounded concurrent dispatch of work items.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics;

use super::types::{ItemOutcome, Outcome, TaskPanicked, WorkItem};

/// Launches one task per item, admitting at most `max_concurrent` at a time.
///
/// Every task that gets an admission permit delivers exactly one
/// [`ItemOutcome`] to the returned receiver. A task still waiting for a permit
/// when the cancellation token fires exits without calling the work function
/// and delivers nothing. The receiver yields `None` once every task has exited,
/// which is the signal that all outcomes were delivered.
pub struct Dispatcher {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher. A ceiling of 0 is raised to 1.
    pub fn new(max_concurrent: usize, cancel: CancellationToken) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            cancel,
        }
    }

    /// The admission ceiling.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Spawns a task for every item and returns the outcome stream.
    ///
    /// The channel is unbounded so a task never waits on a slow consumer.
    /// A panic inside `work` becomes that item's `Failure`. Every delivered
    /// outcome, panics included, is counted in the item metrics.
    pub fn dispatch<I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        work: F,
    ) -> mpsc::UnboundedReceiver<ItemOutcome<T, E>>
    where
        I: WorkItem,
        T: Send + 'static,
        E: From<TaskPanicked> + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T, E>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let work = Arc::new(work);

        debug!(
            "Dispatching {} items (max concurrent: {})",
            items.len(),
            self.max_concurrent
        );

        for item in items {
            let tx = tx.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = self.cancel.clone();
            let work = Arc::clone(&work);

            tokio::spawn(async move {
                let item_id = item.item_id().to_string();

                // Held until the task returns, whatever path it takes.
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(item_id = %item_id, "Cancelled before admission");
                        return;
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let start = Instant::now();
                let outcome = match AssertUnwindSafe(async { work(item).await })
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        let panicked = TaskPanicked::from_payload(payload);
                        warn!(item_id = %item_id, "Work function panicked: {}", panicked.message);
                        Outcome::Failure(E::from(panicked))
                    }
                };
                metrics::record_item(outcome.label(), start.elapsed());

                // Only fails if the collector is gone, in which case nobody wants it.
                let _ = tx.send(ItemOutcome { item_id, outcome });
            });
        }

        rx
    }
}
