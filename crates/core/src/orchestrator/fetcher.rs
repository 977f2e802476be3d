//! Per-application fetch: report info, report id, policy violations, rows.

use std::collections::HashMap;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{Application, IqServerApi, IqServerError, Organization};
use crate::pipeline::{Outcome, TaskPanicked, WorkItem};
use crate::report::ViolationRow;

/// Errors isolated to one application.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Fetching the latest report info failed.
    #[error("get latest report: {0}")]
    ReportInfo(#[source] IqServerError),

    /// The report URL does not contain a report id.
    #[error("malformed report URL: {0}")]
    MalformedReportUrl(String),

    /// Fetching the policy violations failed.
    #[error("get policy violations: {0}")]
    PolicyViolations(#[source] IqServerError),

    /// The run was cancelled while this application was in flight.
    #[error("cancelled")]
    Cancelled,

    /// The fetch panicked.
    #[error(transparent)]
    Panicked(#[from] TaskPanicked),
}

impl WorkItem for Application {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// Organization id to display name, built once before dispatch.
#[derive(Debug, Clone, Default)]
pub struct OrganizationLookup {
    names: HashMap<String, String>,
}

impl OrganizationLookup {
    pub fn from_organizations(organizations: Vec<Organization>) -> Self {
        let names = organizations
            .into_iter()
            .map(|org| (org.id, org.name))
            .collect();
        Self { names }
    }

    /// Name for `organization_id`, or the id itself when unknown.
    pub fn display_name<'a>(&'a self, organization_id: &'a str) -> &'a str {
        match self.names.get(organization_id) {
            Some(name) => name,
            None => {
                debug!(org_id = organization_id, "Organization name not found, using ID");
                organization_id
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Fetches the latest policy violations of one application as rows.
///
/// No report (or a blank report URL) is `Empty`. Cancellation interrupts
/// any pending remote call and yields `Failure(Cancelled)`.
pub async fn fetch_application(
    api: &dyn IqServerApi,
    application: &Application,
    organization: &str,
    cancel: &CancellationToken,
) -> Outcome<ViolationRow, FetchError> {
    let info = match cancel
        .run_until_cancelled(api.latest_report(&application.id))
        .await
    {
        None => return Outcome::Failure(FetchError::Cancelled),
        Some(Err(e)) => return Outcome::Failure(FetchError::ReportInfo(e)),
        Some(Ok(info)) => info,
    };

    let info = match info {
        Some(info) if info.has_report() => info,
        _ => {
            debug!(app_id = %application.id, "No report available, skipping");
            return Outcome::Empty;
        }
    };

    let Some(report_id) = info.report_id() else {
        return Outcome::Failure(FetchError::MalformedReportUrl(
            info.report_html_url.clone(),
        ));
    };
    debug!(
        app_id = %application.id,
        report_id,
        stage = %info.stage,
        "Parsed report ID"
    );

    let report = match cancel
        .run_until_cancelled(api.policy_violations(&application.public_id, report_id))
        .await
    {
        None => return Outcome::Failure(FetchError::Cancelled),
        Some(Err(e)) => return Outcome::Failure(FetchError::PolicyViolations(e)),
        Some(Ok(report)) => report,
    };

    let rows = ViolationRow::from_report(&report, &application.public_id, organization);
    debug!(app_id = %application.id, "Fetched {} policy violation rows", rows.len());

    if rows.is_empty() {
        Outcome::Empty
    } else {
        Outcome::Success(rows)
    }
}
