//! `reqwest` implementation of [`IqServerApi`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::IqServerConfig;
use crate::metrics;

use super::types::{ApplicationsEnvelope, OrganizationsEnvelope};
use super::{Application, IqServerApi, IqServerError, Organization, PolicyViolationReport, ReportInfo};

/// IQ Server API client using HTTP basic auth.
pub struct IqServerClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl IqServerClient {
    /// Create a new client. The configured URL must already include `/api/v2`.
    pub fn new(config: &IqServerConfig) -> Result<Self, IqServerError> {
        if config.username.is_empty() {
            return Err(IqServerError::InvalidConfig(
                "username is required".to_string(),
            ));
        }
        if config.password.is_empty() {
            return Err(IqServerError::InvalidConfig(
                "password is required".to_string(),
            ));
        }

        let base_url = normalize_base_url(&config.url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        info!("Initialized IQ Server API client (base URL: {})", base_url);

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// The normalized base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        label: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, IqServerError> {
        let url = self.base_url.join(endpoint).map_err(|e| {
            IqServerError::InvalidConfig(format!("cannot build URL for '{}': {}", endpoint, e))
        })?;

        debug!(method = "GET", url = %url, "Executing request");
        let start = Instant::now();

        let mut request = self
            .client
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request(label, "error", start.elapsed());
                return Err(IqServerError::from_transport(e));
            }
        };

        let status = response.status();
        metrics::record_request(label, status_class(status), start.elapsed());
        debug!(status = status.as_u16(), url = %url, "Request completed");

        if status == StatusCode::UNAUTHORIZED {
            return Err(IqServerError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(IqServerError::NotFound(url.path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IqServerError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response.json::<T>().await.map_err(|e| {
            IqServerError::Parse(format!("Failed to parse {} response: {}", label, e))
        })
    }
}

#[async_trait]
impl IqServerApi for IqServerClient {
    async fn list_applications(&self) -> Result<Vec<Application>, IqServerError> {
        debug!("Fetching applications");
        let envelope: ApplicationsEnvelope =
            self.get_json("applications", "applications", &[]).await?;
        Ok(envelope.applications)
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, IqServerError> {
        debug!("Fetching organizations");
        let envelope: OrganizationsEnvelope =
            self.get_json("organizations", "organizations", &[]).await?;
        debug!("Retrieved {} organizations", envelope.organizations.len());
        Ok(envelope.organizations)
    }

    async fn latest_report(
        &self,
        application_id: &str,
    ) -> Result<Option<ReportInfo>, IqServerError> {
        let endpoint = format!(
            "reports/applications/{}",
            urlencoding::encode(application_id)
        );
        let reports: Vec<ReportInfo> = self.get_json(&endpoint, "report_info", &[]).await?;

        if reports.is_empty() {
            debug!(app_id = application_id, "No reports found");
        } else {
            debug!(app_id = application_id, count = reports.len(), "Found reports");
        }
        Ok(reports.into_iter().next())
    }

    async fn policy_violations(
        &self,
        public_id: &str,
        report_id: &str,
    ) -> Result<PolicyViolationReport, IqServerError> {
        debug!(public_id, report_id, "Fetching policy violations");
        let endpoint = format!(
            "applications/{}/reports/{}/policy",
            urlencoding::encode(public_id),
            urlencoding::encode(report_id)
        );
        self.get_json(&endpoint, "policy", &[("includeViolationTimes", "true")])
            .await
    }
}

/// Parse the configured server URL, drop empty path segments and make the
/// path end in `/` so relative endpoints join under it.
fn normalize_base_url(raw: &str) -> Result<Url, IqServerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IqServerError::InvalidConfig(
            "server URL is required".to_string(),
        ));
    }

    let mut url = Url::parse(trimmed).map_err(|e| {
        IqServerError::InvalidConfig(format!("invalid server URL '{}': {}", trimmed, e))
    })?;
    if url.cannot_be_a_base() {
        return Err(IqServerError::InvalidConfig(format!(
            "server URL '{}' cannot be used as a base",
            trimmed
        )));
    }

    let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
    let path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    };
    url.set_path(&path);

    Ok(url)
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        100..=199 => "1xx",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> IqServerConfig {
        IqServerConfig {
            url: url.to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            timeout_secs: 5,
        }
    }

    async fn client_for(server: &MockServer) -> IqServerClient {
        IqServerClient::new(&config_for(&format!("{}/api/v2", server.uri()))).unwrap()
    }

    #[test]
    fn test_status_class_buckets() {
        let class = |code: u16| status_class(StatusCode::from_u16(code).unwrap());
        assert_eq!(class(101), "1xx");
        assert_eq!(class(204), "2xx");
        assert_eq!(class(304), "3xx");
        assert_eq!(class(404), "4xx");
        assert_eq!(class(503), "5xx");
        assert_eq!(class(999), "other");
    }

    #[test]
    fn test_normalize_base_url_trailing_slashes() {
        let url = normalize_base_url("https://iq.example.com//api/v2///").unwrap();
        assert_eq!(url.as_str(), "https://iq.example.com/api/v2/");
    }

    #[test]
    fn test_normalize_base_url_root() {
        let url = normalize_base_url("http://localhost:8070").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8070/");
    }

    #[test]
    fn test_new_rejects_missing_credentials() {
        let mut config = config_for("https://iq.example.com/api/v2");
        config.password = String::new();
        assert!(matches!(
            IqServerClient::new(&config),
            Err(IqServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let config = config_for("   ");
        assert!(matches!(
            IqServerClient::new(&config),
            Err(IqServerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_list_applications_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/applications"))
            .and(basic_auth("admin", "secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "applications": [
                    {"id": "app-internal-1", "publicId": "app-public-1", "organizationId": "org-1"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let apps = client.list_applications().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].id, "app-internal-1");
        assert_eq!(apps[0].public_id, "app-public-1");
        assert_eq!(apps[0].organization_id, "org-1");
    }

    #[tokio::test]
    async fn test_list_organizations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [{"id": "org-1", "name": "Acme"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let orgs = client.list_organizations().await.unwrap();
        assert_eq!(
            orgs,
            vec![Organization {
                id: "org-1".to_string(),
                name: "Acme".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_latest_report_takes_first_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/reports/applications/app-internal-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"stage": "build", "reportHtmlUrl": "https://stub/report/rpt-1"},
                {"stage": "release", "reportHtmlUrl": "https://stub/report/rpt-0"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let info = client.latest_report("app-internal-1").await.unwrap().unwrap();
        assert_eq!(info.stage, "build");
        assert_eq!(info.report_id(), Some("rpt-1"));
    }

    #[tokio::test]
    async fn test_latest_report_empty_list_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/reports/applications/app-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.latest_report("app-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_policy_violations_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/applications/app-public-1/reports/rpt-1/policy"))
            .and(query_param("includeViolationTimes", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "components": [{
                    "displayName": "setuptools 80.9.0 (.tar.gz)",
                    "componentIdentifier": {"format": "pypi"},
                    "violations": []
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let report = client
            .policy_violations("app-public-1", "rpt-1")
            .await
            .unwrap();
        assert_eq!(report.components.len(), 1);
        assert_eq!(report.components[0].display_name, "setuptools 80.9.0 (.tar.gz)");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/applications"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.list_applications().await.unwrap_err();
        assert!(matches!(err, IqServerError::Unauthorized));
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.list_organizations().await.unwrap_err() {
            IqServerError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.list_applications().await.unwrap_err();
        assert!(matches!(err, IqServerError::Parse(_)));
    }
}
