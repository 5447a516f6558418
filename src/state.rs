mod request_id;

use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::providers::{CredentialProvider, ProxyList, ProxyProvider, StaticCredentials};
use crate::transport::{HttpTransport, UpstreamSettings};

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub upstream: UpstreamSettings,
    credentials: Box<dyn CredentialProvider>,
    proxies: Box<dyn ProxyProvider>,
    request_ids: RequestIdGenerator,
}

impl AppState {
    /// Build state with the config-backed credential and proxy providers.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the upstream endpoint or session
    /// hint cannot be prepared.
    pub fn new(config: AppConfig, transport: HttpTransport) -> Result<Self, BridgeError> {
        let credentials = StaticCredentials::new(config.upstream.access_tokens.clone());
        let proxies = ProxyList::new(config.upstream.proxies.clone());
        Self::with_providers(config, transport, Box::new(credentials), Box::new(proxies))
    }

    /// Build state around caller-supplied providers.
    ///
    /// # Errors
    ///
    /// See [`AppState::new`].
    pub fn with_providers(
        config: AppConfig,
        transport: HttpTransport,
        credentials: Box<dyn CredentialProvider>,
        proxies: Box<dyn ProxyProvider>,
    ) -> Result<Self, BridgeError> {
        let upstream = UpstreamSettings::from_config(&config.upstream)?;
        Ok(Self {
            config,
            transport,
            upstream,
            credentials,
            proxies,
            request_ids: RequestIdGenerator::new(),
        })
    }

    pub fn next_request_seq(&self) -> u64 {
        self.request_ids.next_seq()
    }

    #[must_use]
    pub fn credential(&self) -> String {
        self.credentials.credential()
    }

    #[must_use]
    pub fn proxy(&self) -> Option<String> {
        self.proxies.proxy()
    }
}
