//! Mock IQ Server for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::client::{
    Application, IqServerApi, IqServerError, Organization, PolicyViolationReport, ReportInfo,
};

/// A recorded API call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedIqCall {
    ListApplications,
    ListOrganizations,
    LatestReport { application_id: String },
    PolicyViolations { public_id: String, report_id: String },
}

/// Mock implementation of the IqServerApi trait.
///
/// Provides controllable behavior for testing:
/// - Configurable applications, organizations, reports and violations
/// - Per-application failures and panics
/// - An artificial delay per call, with a peak in-flight gauge
///
/// Clones share state, so a test can keep a handle while the orchestrator
/// owns another.
///
/// # Example
///
/// ```rust,ignore
/// use iqreport_core::testing::{MockIqServer, fixtures};
///
/// let server = MockIqServer::new();
/// server.set_applications(vec![fixtures::application("a1", "app-one", "org-1")]).await;
/// server.set_report("a1", fixtures::report_info("rpt-1")).await;
/// server.set_violations("app-one", "rpt-1", fixtures::violation_report(2)).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockIqServer {
    applications: Arc<RwLock<Vec<Application>>>,
    organizations: Arc<RwLock<Vec<Organization>>>,
    /// Latest report by internal application id.
    reports: Arc<RwLock<HashMap<String, ReportInfo>>>,
    /// Policy reports by (public id, report id).
    violations: Arc<RwLock<HashMap<(String, String), PolicyViolationReport>>>,
    /// Error message per internal application id.
    failing: Arc<RwLock<HashMap<String, String>>>,
    panicking: Arc<RwLock<HashSet<String>>>,
    listing_error: Arc<RwLock<Option<String>>>,
    lookup_error: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Duration>>,
    calls: Arc<RwLock<Vec<RecordedIqCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockIqServer {
    /// Create a new empty mock server.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub async fn set_applications(&self, applications: Vec<Application>) {
        *self.applications.write().await = applications;
    }

    pub async fn set_organizations(&self, organizations: Vec<Organization>) {
        *self.organizations.write().await = organizations;
    }

    /// Set the latest report of an application (by internal id).
    pub async fn set_report(&self, application_id: &str, info: ReportInfo) {
        self.reports
            .write()
            .await
            .insert(application_id.to_string(), info);
    }

    /// Set the policy report for a public id and report id.
    pub async fn set_violations(
        &self,
        public_id: &str,
        report_id: &str,
        report: PolicyViolationReport,
    ) {
        self.violations
            .write()
            .await
            .insert((public_id.to_string(), report_id.to_string()), report);
    }

    /// Make every call for an application fail.
    pub async fn fail_application(&self, application_id: &str, message: &str) {
        self.failing
            .write()
            .await
            .insert(application_id.to_string(), message.to_string());
    }

    /// Make the report lookup for an application panic.
    pub async fn panic_on_application(&self, application_id: &str) {
        self.panicking
            .write()
            .await
            .insert(application_id.to_string());
    }

    /// Make `list_applications` fail.
    pub async fn fail_listing(&self, message: &str) {
        *self.listing_error.write().await = Some(message.to_string());
    }

    /// Make `list_organizations` fail.
    pub async fn fail_lookup(&self, message: &str) {
        *self.lookup_error.write().await = Some(message.to_string());
    }

    /// Delay every per-application call by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedIqCall> {
        self.calls.read().await.clone()
    }

    /// Highest number of per-application calls seen in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, call: RecordedIqCall) {
        self.calls.write().await.push(call);
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let delay = *self.delay.read().await;
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }

    async fn check_failure(&self, application_id: &str) -> Result<(), IqServerError> {
        match self.failing.read().await.get(application_id) {
            Some(message) => Err(IqServerError::ConnectionFailed(message.clone())),
            None => Ok(()),
        }
    }
}

/// Decrements the in-flight gauge even if the sleeping call is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IqServerApi for MockIqServer {
    async fn list_applications(&self) -> Result<Vec<Application>, IqServerError> {
        self.record(RecordedIqCall::ListApplications).await;
        if let Some(message) = self.listing_error.read().await.clone() {
            return Err(IqServerError::ConnectionFailed(message));
        }
        Ok(self.applications.read().await.clone())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, IqServerError> {
        self.record(RecordedIqCall::ListOrganizations).await;
        if let Some(message) = self.lookup_error.read().await.clone() {
            return Err(IqServerError::ConnectionFailed(message));
        }
        Ok(self.organizations.read().await.clone())
    }

    async fn latest_report(
        &self,
        application_id: &str,
    ) -> Result<Option<ReportInfo>, IqServerError> {
        self.record(RecordedIqCall::LatestReport {
            application_id: application_id.to_string(),
        })
        .await;
        self.simulate_latency().await;

        if self.panicking.read().await.contains(application_id) {
            panic!("mock panic for application {}", application_id);
        }
        self.check_failure(application_id).await?;

        Ok(self.reports.read().await.get(application_id).cloned())
    }

    async fn policy_violations(
        &self,
        public_id: &str,
        report_id: &str,
    ) -> Result<PolicyViolationReport, IqServerError> {
        self.record(RecordedIqCall::PolicyViolations {
            public_id: public_id.to_string(),
            report_id: report_id.to_string(),
        })
        .await;
        self.simulate_latency().await;

        self.violations
            .read()
            .await
            .get(&(public_id.to_string(), report_id.to_string()))
            .cloned()
            .ok_or_else(|| IqServerError::NotFound(format!("report {}", report_id)))
    }
}
