//! Flattened report rows.

use serde::{Deserialize, Serialize};

use crate::client::PolicyViolationReport;

/// Column headers, in output order. `No.` is assigned at write time.
pub const HEADERS: [&str; 11] = [
    "No.",
    "Application",
    "Organization",
    "Policy",
    "Format",
    "Component",
    "Threat",
    "Policy/Action",
    "Constraint Name",
    "Condition",
    "CVE",
];

/// Separator between condition summaries of one constraint.
const CONDITION_SEPARATOR: &str = " | ";

/// One policy violation constraint of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRow {
    pub application: String,
    pub organization: String,
    pub policy: String,
    pub format: String,
    pub component: String,
    pub threat: i64,
    pub policy_action: String,
    pub constraint_name: String,
    pub condition: String,
    pub cve: String,
}

impl ViolationRow {
    /// Flattens a policy report into one row per (component, violation, constraint).
    pub fn from_report(
        report: &PolicyViolationReport,
        application: &str,
        organization: &str,
    ) -> Vec<ViolationRow> {
        let mut rows = Vec::new();

        for component in &report.components {
            for violation in &component.violations {
                let threat = violation.policy_threat_level.trunc() as i64;
                let policy_action = format!("Security-{}", threat);

                for constraint in &violation.constraints {
                    let condition = constraint
                        .conditions
                        .iter()
                        .map(|c| c.condition_summary.as_str())
                        .collect::<Vec<_>>()
                        .join(CONDITION_SEPARATOR);

                    rows.push(ViolationRow {
                        application: application.to_string(),
                        organization: organization.to_string(),
                        policy: violation.policy_name.clone(),
                        format: component.component_identifier.format.clone(),
                        component: component.display_name.clone(),
                        threat,
                        policy_action: policy_action.clone(),
                        constraint_name: constraint.constraint_name.clone(),
                        condition,
                        cve: String::new(),
                    });
                }
            }
        }

        rows
    }

    /// CSV fields for this row at 1-based position `number`.
    pub fn to_record(&self, number: usize) -> [String; 11] {
        [
            number.to_string(),
            self.application.clone(),
            self.organization.clone(),
            self.policy.clone(),
            self.format.clone(),
            self.component.clone(),
            self.threat.to_string(),
            self.policy_action.clone(),
            self.constraint_name.clone(),
            self.condition.clone(),
            self.cve.clone(),
        ]
    }
}
