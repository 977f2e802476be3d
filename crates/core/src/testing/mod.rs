//! Testing utilities and mock implementations.
//!
//! `MockIqServer` stands in for a real IQ Server so report runs can be
//! exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use iqreport_core::testing::{fixtures, MockIqServer};
//!
//! let server = MockIqServer::new();
//! server.set_applications(vec![fixtures::application("a1", "app-one", "org-1")]).await;
//! server.set_organizations(vec![fixtures::organization("org-1", "Acme")]).await;
//! ```

mod mock_iq_server;

pub use mock_iq_server::{MockIqServer, RecordedIqCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::client::{
        Application, Component, ComponentIdentifier, Condition, Constraint, Organization,
        PolicyViolationReport, ReportInfo, Violation,
    };

    pub fn application(id: &str, public_id: &str, organization_id: &str) -> Application {
        Application {
            id: id.to_string(),
            public_id: public_id.to_string(),
            organization_id: organization_id.to_string(),
        }
    }

    pub fn organization(id: &str, name: &str) -> Organization {
        Organization {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// Report info whose HTML URL carries `report_id`.
    pub fn report_info(report_id: &str) -> ReportInfo {
        ReportInfo {
            stage: "build".to_string(),
            report_html_url: format!("ui/links/application/app/report/{}", report_id),
        }
    }

    /// A single maven component with one violation of threat 9.
    pub fn violation(policy: &str, component: &str) -> Component {
        Component {
            display_name: component.to_string(),
            component_identifier: ComponentIdentifier {
                format: "maven".to_string(),
            },
            violations: vec![Violation {
                policy_name: policy.to_string(),
                policy_threat_level: 9.0,
                constraints: vec![Constraint {
                    constraint_name: "CVSS >= 9".to_string(),
                    conditions: vec![Condition {
                        condition_summary: "Security Vulnerability Severity >= 9".to_string(),
                    }],
                }],
            }],
        }
    }

    /// A report producing exactly `rows` rows.
    pub fn violation_report(rows: usize) -> PolicyViolationReport {
        PolicyViolationReport {
            components: (1..=rows)
                .map(|i| violation("Security-Critical", &format!("lib-{} 1.0.0", i)))
                .collect(),
        }
    }
}
