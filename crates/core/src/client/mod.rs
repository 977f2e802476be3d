//! IQ Server REST API access.
//!
//! This module provides the `IqServerApi` trait used by the report service
//! and `IqServerClient`, its `reqwest` implementation against the v2 API.

mod iq_server;
mod types;

pub use iq_server::IqServerClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to IQ Server.
#[derive(Debug, Error)]
pub enum IqServerError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Could not connect to the server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials were rejected (401).
    #[error("Unauthorized: check IQ Server credentials")]
    Unauthorized,

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client could not be constructed from the given settings.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl IqServerError {
    /// Maps a transport error into the most specific variant.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::ConnectionFailed(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}

/// Read access to the IQ Server endpoints the report needs.
///
/// Implementations must be safe to call concurrently for different
/// applications and must not retry internally.
#[async_trait]
pub trait IqServerApi: Send + Sync {
    /// List every application visible to the configured user.
    async fn list_applications(&self) -> Result<Vec<Application>, IqServerError>;

    /// List every organization.
    async fn list_organizations(&self) -> Result<Vec<Organization>, IqServerError>;

    /// Most recent report for an application (by internal id), if any.
    async fn latest_report(
        &self,
        application_id: &str,
    ) -> Result<Option<ReportInfo>, IqServerError>;

    /// Policy violation report for an application (by public id) and report id.
    async fn policy_violations(
        &self,
        public_id: &str,
        report_id: &str,
    ) -> Result<PolicyViolationReport, IqServerError>;
}
