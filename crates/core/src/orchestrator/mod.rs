//! Report orchestration.
//!
//! The orchestrator drives one report run end to end:
//! - **Listing**: applications and organizations, fetched once up front
//! - **Fetch**: one task per application, bounded by `max_concurrent`
//! - **Write**: the collected rows, written atomically after every task has finished

mod config;
mod fetcher;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use fetcher::{fetch_application, FetchError, OrganizationLookup};
pub use runner::ReportOrchestrator;
pub use types::{RunError, RunPhase, RunResult, RunStatus};
