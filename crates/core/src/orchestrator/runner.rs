//! Report orchestrator implementation.
//!
//! One run goes through these phases in order:
//! - List applications (hard failure if the list fails or is empty)
//! - Build the organization lookup (hard failure)
//! - Fetch every application under the concurrency ceiling
//! - Drain all outcomes, then write the report atomically

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::IqServerApi;
use crate::metrics;
use crate::pipeline::{Dispatcher, ResultCollector};
use crate::report::DurableWriter;

use super::config::OrchestratorConfig;
use super::fetcher::{fetch_application, FetchError, OrganizationLookup};
use super::types::{RunError, RunPhase, RunResult};

/// Produces the consolidated policy violation report.
pub struct ReportOrchestrator {
    api: Arc<dyn IqServerApi>,
    config: OrchestratorConfig,
    writer: DurableWriter,
}

impl ReportOrchestrator {
    pub fn new(api: Arc<dyn IqServerApi>, config: OrchestratorConfig) -> Self {
        let writer = match &config.staging_dir {
            Some(dir) => DurableWriter::new().with_staging_dir(dir.clone()),
            None => DurableWriter::new(),
        };
        Self {
            api,
            config,
            writer,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one report and writes it to `output_dir/filename`.
    ///
    /// Item failures do not abort the run; they come back in
    /// [`RunResult::failures`]. Cancelling `cancel` stops admission of new
    /// applications and interrupts in-flight ones, but whatever was
    /// collected is still written.
    pub async fn run(
        &self,
        filename: &str,
        cancel: CancellationToken,
    ) -> Result<RunResult, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("report_run", %run_id, filename);

        let result = self.run_inner(filename, cancel).instrument(span).await;

        let label = match &result {
            Ok(result) => result.status().as_str(),
            Err(_) => "failed",
        };
        metrics::RUNS_TOTAL.with_label_values(&[label]).inc();

        result
    }

    async fn run_inner(
        &self,
        filename: &str,
        cancel: CancellationToken,
    ) -> Result<RunResult, RunError> {
        let mut phase = RunPhase::Start;
        info!("Fetching applications");

        let applications = self.api.list_applications().await.map_err(|e| {
            error!(%phase, "Failed to list applications: {}", e);
            RunError::Listing(e)
        })?;
        if applications.is_empty() {
            warn!("No applications found");
            return Err(RunError::NoItems);
        }
        phase = RunPhase::ListingFetched;
        info!(%phase, "Found {} applications", applications.len());

        let organizations = self.api.list_organizations().await.map_err(|e| {
            error!(%phase, "Failed to list organizations: {}", e);
            RunError::Lookup(e)
        })?;
        let lookup = Arc::new(OrganizationLookup::from_organizations(organizations));
        phase = RunPhase::LookupBuilt;
        debug!(%phase, "Organization lookup has {} entries", lookup.len());

        let ids: Vec<String> = applications.iter().map(|app| app.id.clone()).collect();

        let dispatcher = Dispatcher::new(self.config.max_concurrent, cancel.clone());
        let api = Arc::clone(&self.api);
        let work_cancel = cancel.clone();
        let rx = dispatcher.dispatch(applications, move |app| {
            let api = Arc::clone(&api);
            let lookup = Arc::clone(&lookup);
            let cancel = work_cancel.clone();
            async move {
                let organization = lookup.display_name(&app.organization_id).to_string();
                fetch_application(api.as_ref(), &app, &organization, &cancel).await
            }
        });
        phase = RunPhase::Dispatched;
        debug!(%phase, "Dispatched {} applications", ids.len());

        let collected = ResultCollector::<_, FetchError>::new(rx).run().await;
        phase = RunPhase::Collected;

        let skipped = collected.missing(ids.iter().map(String::as_str));
        if !skipped.is_empty() {
            warn!(%phase, "Run cancelled, {} applications never started", skipped.len());
            metrics::ITEMS_PROCESSED
                .with_label_values(&["skipped"])
                .inc_by(skipped.len() as u64);
        }
        info!(
            %phase,
            records = collected.records.len(),
            failed = collected.failures.len(),
            empty = collected.empty,
            "Collected all outcomes"
        );

        let record_count = collected.records.len();
        let dest = self.config.output_dir.join(filename);
        let path = self
            .writer
            .write_rows_async(dest, collected.records)
            .await
            .map_err(|e| {
                error!(%phase, "Failed to write report: {}", e);
                RunError::Write(e)
            })?;
        metrics::RECORDS_WRITTEN.inc_by(record_count as u64);
        phase = RunPhase::Written;
        debug!(%phase, path = %path.display(), "Report persisted");

        let result = RunResult {
            path,
            record_count,
            failures: collected.failures,
            skipped,
            empty_count: collected.empty,
        };

        phase = RunPhase::Done;
        info!(
            %phase,
            status = result.status().as_str(),
            "Report written to {} ({} rows)",
            result.path.display(),
            record_count
        );

        Ok(result)
    }
}
