//! Types for report runs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::client::IqServerError;
use crate::pipeline::{ItemErrors, ItemFailure};
use crate::report::WriteError;

use super::fetcher::FetchError;

/// Stages of a run, in order. A run only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Start,
    ListingFetched,
    LookupBuilt,
    Dispatched,
    Collected,
    Written,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::ListingFetched => "listing_fetched",
            Self::LookupBuilt => "lookup_built",
            Self::Dispatched => "dispatched",
            Self::Collected => "collected",
            Self::Written => "written",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that abort a run. No report path is produced.
#[derive(Debug, Error)]
pub enum RunError {
    /// Listing applications failed.
    #[error("get applications: {0}")]
    Listing(#[source] IqServerError),

    /// The server returned no applications.
    #[error("no applications found")]
    NoItems,

    /// Listing organizations failed.
    #[error("get organizations: {0}")]
    Lookup(#[source] IqServerError),

    /// Writing the report failed.
    #[error("write csv: {0}")]
    Write(#[source] WriteError),
}

impl RunError {
    /// The last phase the run completed before failing.
    pub fn phase(&self) -> RunPhase {
        match self {
            Self::Listing(_) => RunPhase::Start,
            Self::NoItems => RunPhase::ListingFetched,
            Self::Lookup(_) => RunPhase::ListingFetched,
            Self::Write(_) => RunPhase::Collected,
        }
    }
}

/// How a run that produced a report ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every application was processed without error.
    Complete,
    /// The report was written but some applications failed or were skipped.
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
        }
    }
}

/// Summary of a run that wrote its report.
#[derive(Debug)]
pub struct RunResult {
    /// Absolute path of the written report.
    pub path: PathBuf,
    /// Number of rows written.
    pub record_count: usize,
    /// Applications whose fetch failed.
    pub failures: Vec<ItemFailure<FetchError>>,
    /// Applications never started because the run was cancelled.
    pub skipped: Vec<String>,
    /// Applications without a report or without violations.
    pub empty_count: usize,
}

impl RunResult {
    pub fn status(&self) -> RunStatus {
        if self.failures.is_empty() && self.skipped.is_empty() {
            RunStatus::Complete
        } else {
            RunStatus::Partial
        }
    }

    /// Aggregate of all item failures, if there were any.
    pub fn item_errors(&self) -> Option<ItemErrors<'_, FetchError>> {
        ItemErrors::new(&self.failures).map(|errors| {
            errors
                .with_summary("encountered errors while fetching reports")
                .with_item_noun("app")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(failures: Vec<ItemFailure<FetchError>>, skipped: Vec<String>) -> RunResult {
        RunResult {
            path: PathBuf::from("/tmp/report.csv"),
            record_count: 1,
            failures,
            skipped,
            empty_count: 0,
        }
    }

    #[test]
    fn test_status_complete() {
        let result = result_with(Vec::new(), Vec::new());
        assert_eq!(result.status(), RunStatus::Complete);
        assert!(result.item_errors().is_none());
    }

    #[test]
    fn test_status_partial_on_failure() {
        let result = result_with(
            vec![ItemFailure {
                item_id: "app-2".to_string(),
                error: FetchError::MalformedReportUrl("https://iq/x".to_string()),
            }],
            Vec::new(),
        );
        assert_eq!(result.status(), RunStatus::Partial);
        let errors = result.item_errors().unwrap();
        let text = errors.to_string();
        assert!(text.starts_with("encountered errors while fetching reports (1 failed):"));
        assert!(text.contains("app app-2: malformed report URL"));
    }

    #[test]
    fn test_status_partial_on_skip() {
        let result = result_with(Vec::new(), vec!["app-9".to_string()]);
        assert_eq!(result.status(), RunStatus::Partial);
        assert!(result.item_errors().is_none());
    }

    #[test]
    fn test_error_display_and_phase() {
        assert_eq!(RunError::NoItems.to_string(), "no applications found");
        assert_eq!(RunError::NoItems.phase(), RunPhase::ListingFetched);

        let err = RunError::Listing(IqServerError::Unauthorized);
        assert!(err.to_string().starts_with("get applications:"));
        assert_eq!(err.phase(), RunPhase::Start);
    }

    #[test]
    fn test_phases_are_ordered() {
        assert!(RunPhase::Start < RunPhase::ListingFetched);
        assert!(RunPhase::Collected < RunPhase::Written);
        assert_eq!(RunPhase::LookupBuilt.to_string(), "lookup_built");
    }
}
