use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - IQ Server URL is an absolute http(s) URL
/// - Credentials are not blank
/// - Concurrency ceiling and timeout are at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let url = config.iq_server.url.trim();
    if url.is_empty() {
        return Err(ConfigError::ValidationError(
            "iq_server.url is required".to_string(),
        ));
    }
    let parsed = reqwest::Url::parse(url).map_err(|e| {
        ConfigError::ValidationError(format!("iq_server.url is not a valid URL: {}", e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "iq_server.url must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    if config.iq_server.username.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "iq_server.username is required".to_string(),
        ));
    }
    if config.iq_server.password.is_empty() {
        return Err(ConfigError::ValidationError(
            "iq_server.password is required".to_string(),
        ));
    }
    if config.iq_server.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "iq_server.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.fetch.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.max_concurrent cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, IqServerConfig, OutputConfig};

    fn valid_config() -> Config {
        Config {
            iq_server: IqServerConfig {
                url: "https://iq.example.com/api/v2".to_string(),
                username: "admin".to_string(),
                password: "secret".to_string(),
                timeout_secs: 30,
            },
            output: OutputConfig::default(),
            fetch: FetchConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_bad_url_fails() {
        let mut config = valid_config();
        config.iq_server.url = "not a url".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_non_http_scheme_fails() {
        let mut config = valid_config();
        config.iq_server.url = "ftp://iq.example.com/api/v2".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_blank_username_fails() {
        let mut config = valid_config();
        config.iq_server.username = "   ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_password_fails() {
        let mut config = valid_config();
        config.iq_server.password = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = valid_config();
        config.fetch.max_concurrent = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_concurrent"));
    }
}
