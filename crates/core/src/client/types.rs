//! IQ Server API models.

use serde::{Deserialize, Serialize};

/// An application registered in IQ Server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Internal id, used by the reports endpoints.
    pub id: String,
    /// Public id, used by the policy endpoint and shown in the report.
    pub public_id: String,
    #[serde(default)]
    pub organization_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplicationsEnvelope {
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// An organization that owns applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrganizationsEnvelope {
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

/// Metadata of an application's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInfo {
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub report_html_url: String,
}

impl ReportInfo {
    /// Report id embedded in the HTML URL (the part after `/report/`).
    pub fn report_id(&self) -> Option<&str> {
        self.report_html_url
            .split_once("/report/")
            .map(|(_, id)| id)
            .filter(|id| !id.is_empty())
    }

    /// Whether the info actually points at a report.
    pub fn has_report(&self) -> bool {
        !self.report_html_url.trim().is_empty()
    }
}

/// Policy violation report for one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyViolationReport {
    #[serde(default)]
    pub components: Vec<Component>,
}

/// A library or asset carrying violations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub component_identifier: ComponentIdentifier,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentIdentifier {
    #[serde(default)]
    pub format: String,
}

/// A policy broken by a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(default)]
    pub policy_name: String,
    /// Numeric in the API, sometimes fractional.
    #[serde(default)]
    pub policy_threat_level: f64,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default)]
    pub constraint_name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub condition_summary: String,
}
