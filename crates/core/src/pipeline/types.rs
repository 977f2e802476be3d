//! Types shared by the dispatcher and the collector.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// A unit of work that can be dispatched.
pub trait WorkItem: Send + 'static {
    /// Identifier carried by this item's outcome and failure.
    fn item_id(&self) -> &str;
}

/// Terminal result of processing one item.
#[derive(Debug)]
pub enum Outcome<T, E> {
    /// Records produced by the item, in the order the work function emitted them.
    Success(Vec<T>),
    /// The item legitimately had nothing to contribute.
    Empty,
    /// The item failed; other items are unaffected.
    Failure(E),
}

impl<T, E> Outcome<T, E> {
    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty => "empty",
            Self::Failure(_) => "failed",
        }
    }
}

/// An outcome tagged with the item it belongs to.
#[derive(Debug)]
pub struct ItemOutcome<T, E> {
    pub item_id: String,
    pub outcome: Outcome<T, E>,
}

/// A failure isolated to a single item.
#[derive(Debug)]
pub struct ItemFailure<E> {
    pub item_id: String,
    pub error: E,
}

impl<E: fmt::Display> fmt::Display for ItemFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item_id, self.error)
    }
}

impl<E> std::error::Error for ItemFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Non-fatal aggregate of every item failure in a run.
#[derive(Debug)]
pub struct ItemErrors<'a, E> {
    failures: &'a [ItemFailure<E>],
    summary: &'static str,
    item_noun: Option<&'static str>,
}

impl<'a, E> ItemErrors<'a, E> {
    /// Wraps the failures, or returns `None` when there are none.
    pub fn new(failures: &'a [ItemFailure<E>]) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self {
                failures,
                summary: "item errors",
                item_noun: None,
            })
        }
    }

    /// Sets the headline shown before the failure count.
    pub fn with_summary(mut self, summary: &'static str) -> Self {
        self.summary = summary;
        self
    }

    /// Prefixes each item id with `noun` when listing failures.
    pub fn with_item_noun(mut self, noun: &'static str) -> Self {
        self.item_noun = Some(noun);
        self
    }

    pub fn failures(&self) -> &'a [ItemFailure<E>] {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for ItemErrors<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} failed):", self.summary, self.failures.len())?;
        for failure in self.failures {
            match self.item_noun {
                Some(noun) => write!(f, "\n  {} {}", noun, failure)?,
                None => write!(f, "\n  {}", failure)?,
            }
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ItemErrors<'_, E> {}

/// A work function panicked while processing an item.
#[derive(Debug, Clone, Error)]
#[error("task panicked: {message}")]
pub struct TaskPanicked {
    pub message: String,
}

impl TaskPanicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}
