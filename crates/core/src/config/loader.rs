use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variables understood without the `IQREPORT_` prefix.
const LEGACY_ENV_KEYS: [&str; 4] = [
    "IQ_SERVER_URL",
    "IQ_USERNAME",
    "IQ_PASSWORD",
    "REPORT_OUTPUT_DIR",
];

/// Load configuration from an optional TOML file with environment variable overrides.
///
/// Precedence, lowest first: TOML file, `IQREPORT_*` variables (nested with `__`),
/// then the legacy `IQ_SERVER_URL`/`IQ_USERNAME`/`IQ_PASSWORD`/`REPORT_OUTPUT_DIR`.
/// A missing file is not an error; the remaining providers may still supply everything.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("IQREPORT_").split("__"))
        .merge(
            Env::raw()
                .only(&LEGACY_ENV_KEYS)
                .map(|key| legacy_key(key.as_str()).into()),
        )
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(apply_defaults(config))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str)
        .map(apply_defaults)
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load a dotenv file into the process environment if it exists.
///
/// Returns whether a file was loaded.
pub fn load_env_file(path: &Path) -> bool {
    dotenvy::from_path(path).is_ok()
}

fn legacy_key(key: &str) -> String {
    match key.to_ascii_uppercase().as_str() {
        "IQ_SERVER_URL" => "iq_server.url".to_string(),
        "IQ_USERNAME" => "iq_server.username".to_string(),
        "IQ_PASSWORD" => "iq_server.password".to_string(),
        "REPORT_OUTPUT_DIR" => "output.dir".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn apply_defaults(mut config: Config) -> Config {
    if config.output.dir.as_os_str().to_string_lossy().trim().is_empty() {
        config.output.dir = super::types::default_output_dir();
    }
    config
}
