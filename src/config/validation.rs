use super::{AppConfig, ConfigError};

/// Upper bound on automatic follow-up requests for one answer.
pub const MAX_CONTINUATIONS_LIMIT: u32 = 10;

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream_config(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.port == 0 {
        return Err(validation_err("server.port must be greater than 0"));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream_config(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_http_url("upstream.endpoint", &upstream.endpoint)?;
    if !upstream.endpoint_override.trim().is_empty() {
        validate_http_url("upstream.endpoint_override", &upstream.endpoint_override)?;
    }
    for (idx, token) in upstream.access_tokens.iter().enumerate() {
        if token.trim().is_empty() {
            return Err(validation_err(format!(
                "upstream.access_tokens[{idx}] cannot be empty"
            )));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(validation_err(format!(
                "upstream.access_tokens[{idx}] must not contain whitespace"
            )));
        }
    }
    validate_http_url("upstream.models_endpoint", &upstream.models_endpoint)?;
    if upstream.official_api_key.chars().any(char::is_whitespace) {
        return Err(validation_err(
            "upstream.official_api_key must not contain whitespace",
        ));
    }
    for (idx, proxy) in upstream.proxies.iter().enumerate() {
        validate_proxy_url(idx, proxy)?;
    }
    if let Some(hint) = upstream.session_hint.as_deref() {
        if hint.contains(';') || hint.chars().any(char::is_whitespace) {
            return Err(validation_err(
                "upstream.session_hint must not contain ';' or whitespace",
            ));
        }
    }
    if upstream.max_continuations > MAX_CONTINUATIONS_LIMIT {
        return Err(validation_err(format!(
            "upstream.max_continuations must be at most {MAX_CONTINUATIONS_LIMIT}"
        )));
    }
    Ok(())
}

fn validate_http_url(field_name: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(validation_err(format!(
            "{field_name} must start with http:// or https://"
        )));
    }
    url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field_name} is not a valid URL: {err}")))?;
    Ok(())
}

fn validate_proxy_url(idx: usize, proxy: &str) -> Result<(), ConfigError> {
    let proxy = proxy.trim();
    if proxy.is_empty() {
        return Err(validation_err(format!(
            "upstream.proxies[{idx}] cannot be empty"
        )));
    }
    let parsed = url::Url::parse(proxy).map_err(|err| {
        validation_err(format!(
            "upstream.proxies[{idx}] is not a valid URL: {err}"
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "upstream.proxies[{idx}] must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;

    fn make_valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                access_tokens: vec!["eyJhbGciOi.token".to_string()],
                proxies: vec!["http://127.0.0.1:3128".to_string()],
                session_hint: Some("user-abc".to_string()),
                ..UpstreamConfig::default()
            },
            features: FeaturesConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_port() {
        let mut config = make_valid_config();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = make_valid_config();
        config.server.timeout = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_pool_max_idle_per_host() {
        let mut config = make_valid_config();
        config.server.http_pool_max_idle_per_host = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_runtime_worker_threads() {
        let mut config = make_valid_config();
        config.server.runtime_worker_threads = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = make_valid_config();
        config.upstream.endpoint = "ftp://bad.url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_endpoint_override() {
        let mut config = make_valid_config();
        config.upstream.endpoint_override = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_models_endpoint() {
        let mut config = make_valid_config();
        config.upstream.models_endpoint = "api.openai.com/v1/models".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_official_api_key_rejects_whitespace() {
        let mut config = make_valid_config();
        config.upstream.official_api_key = "sk-abc def".to_string();
        assert!(validate_config(&config).is_err());
        config.upstream.official_api_key = "sk-abcdef".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_blank_endpoint_override_is_ignored() {
        let mut config = make_valid_config();
        config.upstream.endpoint_override = "   ".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_token_with_whitespace() {
        let mut config = make_valid_config();
        config.upstream.access_tokens = vec!["Bearer abc".to_string()];
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("whitespace"));
    }

    #[test]
    fn test_invalid_proxy_url() {
        let mut config = make_valid_config();
        config.upstream.proxies = vec!["bad-proxy".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unsupported_proxy_scheme() {
        let mut config = make_valid_config();
        config.upstream.proxies = vec!["ftp://127.0.0.1:21".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_session_hint_with_separator() {
        let mut config = make_valid_config();
        config.upstream.session_hint = Some("a; b".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_max_continuations_limit() {
        let mut config = make_valid_config();
        config.upstream.max_continuations = MAX_CONTINUATIONS_LIMIT + 1;
        assert!(validate_config(&config).is_err());
        config.upstream.max_continuations = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = make_valid_config();
        config.features.log_level = "VERBOSE".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = make_valid_config();
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
