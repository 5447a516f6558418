pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Overall upstream call timeout in seconds, streaming included.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_timeout() -> u64 {
    360
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            base_path: String::new(),
            http_use_env_proxy: false,
        }
    }
}

/// Conversation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Replaces `endpoint` when non-empty.
    #[serde(default)]
    pub endpoint_override: String,
    /// Session identity sent as the `_puid` cookie.
    #[serde(default)]
    pub session_hint: Option<String>,
    #[serde(default)]
    pub access_tokens: Vec<String>,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default = "default_true")]
    pub history_disabled: bool,
    #[serde(default = "default_max_continuations")]
    pub max_continuations: u32,
    /// Source of the `/v1/models` list.
    #[serde(default = "default_models_endpoint")]
    pub models_endpoint: String,
    /// Bearer key for `models_endpoint`. Sent only when non-empty.
    #[serde(default)]
    pub official_api_key: String,
}

fn default_endpoint() -> String {
    crate::transport::DEFAULT_CONVERSATION_ENDPOINT.to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_continuations() -> u32 {
    3
}
fn default_models_endpoint() -> String {
    crate::transport::DEFAULT_MODELS_ENDPOINT.to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            endpoint_override: String::new(),
            session_hint: None,
            access_tokens: Vec::new(),
            proxies: Vec::new(),
            history_disabled: true,
            max_continuations: default_max_continuations(),
            models_endpoint: default_models_endpoint(),
            official_api_key: String::new(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or [`ConfigError::Validation`]
/// when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        // The example config should load and validate successfully
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout, 360);
        assert!(!config.server.http_use_env_proxy);
        assert_eq!(config.upstream.max_continuations, 3);
        assert_eq!(config.upstream.access_tokens.len(), 2);
        assert!(config.upstream.endpoint_override.is_empty());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.upstream.endpoint,
            "https://chat.openai.com/backend-api/conversation"
        );
        assert!(config.upstream.session_hint.is_none());
        assert!(config.upstream.history_disabled);
        assert_eq!(config.upstream.models_endpoint, "https://api.openai.com/v1/models");
        assert!(config.upstream.official_api_key.is_empty());
        assert_eq!(config.features.log_level, "INFO");
    }

    #[test]
    fn test_partial_upstream_section() {
        let config = parse_config(
            "upstream:\n  session_hint: user-abc\n  proxies:\n    - http://127.0.0.1:3128\n",
        )
        .unwrap();
        assert_eq!(config.upstream.session_hint.as_deref(), Some("user-abc"));
        assert_eq!(config.upstream.proxies, vec!["http://127.0.0.1:3128"]);
        assert_eq!(config.upstream.max_continuations, 3);
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let err = parse_config("server: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
