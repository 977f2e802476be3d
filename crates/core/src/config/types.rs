use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub iq_server: IqServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// IQ Server connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IqServerConfig {
    /// Base API URL, including the `/api/v2` suffix
    pub url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Report output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("reports_output")
}

/// Concurrent fetch settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Maximum number of applications fetched at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}

/// Sanitized config for logging (password redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub iq_server: SanitizedIqServerConfig,
    pub output: OutputConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIqServerConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            iq_server: SanitizedIqServerConfig {
                url: config.iq_server.url.clone(),
                username: config.iq_server.username.clone(),
                password_configured: !config.iq_server.password.is_empty(),
                timeout_secs: config.iq_server.timeout_secs,
            },
            output: config.output.clone(),
            fetch: config.fetch.clone(),
        }
    }
}
