//! Folding of item outcomes into success and failure accumulators.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::{ItemFailure, ItemOutcome, Outcome};

/// Everything gathered from one dispatch.
#[derive(Debug)]
pub struct Collected<T, E> {
    /// Records from every successful item, in arrival order.
    pub records: Vec<T>,
    /// One entry per failed item, in arrival order.
    pub failures: Vec<ItemFailure<E>>,
    /// Items that finished with nothing to contribute.
    pub empty: usize,
    /// Number of outcomes delivered per item id.
    pub completed: HashMap<String, usize>,
}

impl<T, E> Default for Collected<T, E> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
            empty: 0,
            completed: HashMap::new(),
        }
    }
}

impl<T, E> Collected<T, E> {
    /// Folds a single outcome in. Never stops on failure.
    pub fn fold(&mut self, item: ItemOutcome<T, E>) {
        let ItemOutcome { item_id, outcome } = item;
        match outcome {
            Outcome::Success(records) => {
                debug!(item_id = %item_id, "Collected {} records", records.len());
                self.records.extend(records);
            }
            Outcome::Empty => {
                debug!(item_id = %item_id, "Nothing to collect");
                self.empty += 1;
            }
            Outcome::Failure(error) => {
                self.failures.push(ItemFailure {
                    item_id: item_id.clone(),
                    error,
                });
            }
        }
        *self.completed.entry(item_id).or_insert(0) += 1;
    }

    /// Ids from `all_ids` that never delivered an outcome, in the given order.
    ///
    /// Ids are matched by count, so an id listed twice with one outcome
    /// appears once in the result.
    pub fn missing<'a, It>(&self, all_ids: It) -> Vec<String>
    where
        It: IntoIterator<Item = &'a str>,
    {
        let mut remaining = self.completed.clone();
        all_ids
            .into_iter()
            .filter(|id| match remaining.get_mut(*id) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            })
            .map(str::to_string)
            .collect()
    }
}

/// Drains a dispatcher's outcome stream.
pub struct ResultCollector<T, E> {
    rx: mpsc::UnboundedReceiver<ItemOutcome<T, E>>,
}

impl<T, E> ResultCollector<T, E> {
    pub fn new(rx: mpsc::UnboundedReceiver<ItemOutcome<T, E>>) -> Self {
        Self { rx }
    }

    /// Consume outcomes until every producer has finished.
    pub async fn run(mut self) -> Collected<T, E>
    where
        E: std::fmt::Display,
    {
        let mut collected = Collected::default();

        while let Some(item) = self.rx.recv().await {
            if let Outcome::Failure(ref error) = item.outcome {
                warn!(item_id = %item.item_id, "Item failed: {}", error);
            }
            collected.fold(item);
        }

        debug!(
            "Collection finished: {} records, {} failures, {} empty",
            collected.records.len(),
            collected.failures.len(),
            collected.empty
        );
        collected
    }
}
