use bytes::Bytes;

use crate::config::UpstreamConfig;
use crate::error::BridgeError;
use crate::protocol::mapping::TranslatedRequest;
use crate::protocol::upstream::ConversationRequestBody;

/// Conversation endpoint used when no override is configured.
pub const DEFAULT_CONVERSATION_ENDPOINT: &str = "https://chat.openai.com/backend-api/conversation";
/// Official model list served on `/v1/models`.
pub const DEFAULT_MODELS_ENDPOINT: &str = "https://api.openai.com/v1/models";
/// Browser user agent the backend expects.
pub const UPSTREAM_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36";

/// Endpoint and session settings resolved once from configuration.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    endpoint: url::Url,
    static_headers: http::HeaderMap,
    models_endpoint: url::Url,
    models_headers: http::HeaderMap,
}

impl UpstreamSettings {
    /// Resolve the endpoint (a non-empty override wins) and prebuild the
    /// headers every call carries.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the endpoint is not a valid URL or
    /// the session hint cannot be sent as a header.
    pub fn new(
        endpoint: &str,
        endpoint_override: &str,
        session_hint: Option<&str>,
    ) -> Result<Self, BridgeError> {
        let endpoint_override = endpoint_override.trim();
        let endpoint = if endpoint_override.is_empty() {
            endpoint
        } else {
            endpoint_override
        };
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| BridgeError::Config(format!("Invalid upstream endpoint: {e}")))?;

        let mut static_headers = http::HeaderMap::new();
        static_headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        static_headers.insert(
            http::header::USER_AGENT,
            http::HeaderValue::from_static(UPSTREAM_USER_AGENT),
        );
        static_headers.insert(http::header::ACCEPT, http::HeaderValue::from_static("*/*"));
        if let Some(hint) = session_hint.map(str::trim).filter(|hint| !hint.is_empty()) {
            let mut cookie = http::HeaderValue::from_str(&format!("_puid={hint};"))
                .map_err(|e| BridgeError::Config(format!("Invalid session hint: {e}")))?;
            cookie.set_sensitive(true);
            static_headers.insert(http::header::COOKIE, cookie);
        }

        let (models_endpoint, models_headers) = models_source(DEFAULT_MODELS_ENDPOINT, "")?;
        Ok(Self {
            endpoint,
            static_headers,
            models_endpoint,
            models_headers,
        })
    }

    /// Point the model list at `endpoint`, authenticated with `api_key` when
    /// it is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the endpoint is not a valid URL or
    /// the key cannot be sent as a header.
    pub fn with_models_source(mut self, endpoint: &str, api_key: &str) -> Result<Self, BridgeError> {
        (self.models_endpoint, self.models_headers) = models_source(endpoint, api_key)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`UpstreamSettings::new`] and [`UpstreamSettings::with_models_source`].
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, BridgeError> {
        Self::new(
            &config.endpoint,
            &config.endpoint_override,
            config.session_hint.as_deref(),
        )?
        .with_models_source(&config.models_endpoint, &config.official_api_key)
    }

    #[must_use]
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    #[must_use]
    pub fn models_endpoint(&self) -> &url::Url {
        &self.models_endpoint
    }
}

fn models_source(endpoint: &str, api_key: &str) -> Result<(url::Url, http::HeaderMap), BridgeError> {
    let endpoint = url::Url::parse(endpoint.trim())
        .map_err(|e| BridgeError::Config(format!("Invalid models endpoint: {e}")))?;

    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::ACCEPT,
        http::HeaderValue::from_static("application/json"),
    );
    let api_key = api_key.trim();
    if !api_key.is_empty() {
        let mut value = http::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| BridgeError::Config(format!("Invalid official API key: {e}")))?;
        value.set_sensitive(true);
        headers.insert(http::header::AUTHORIZATION, value);
    }
    Ok((endpoint, headers))
}

/// Fully built outbound call.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub method: http::Method,
    pub url: url::Url,
    pub headers: http::HeaderMap,
    pub body: Bytes,
    /// Proxy to route this call through; selects the transport client.
    pub proxy: Option<String>,
}

/// Build the outbound call for `request`.
///
/// The bearer header is only attached for a non-empty credential.
///
/// # Errors
///
/// Returns [`BridgeError::Build`] when the body cannot be serialized or the
/// credential is not a valid header value.
pub fn build_upstream_call(
    request: &TranslatedRequest,
    settings: &UpstreamSettings,
    credential: &str,
    proxy: Option<&str>,
) -> Result<UpstreamCall, BridgeError> {
    let body = ConversationRequestBody {
        action: request.action(),
        messages: &request.messages,
        parent_message_id: request.parent_message_id(),
        conversation_id: request.conversation_id(),
        model: &request.model,
        history_and_training_disabled: request.history_disabled,
        stream: request.stream,
    };
    let body = serde_json::to_vec(&body)
        .map_err(|e| BridgeError::Build(format!("Failed to serialize request body: {e}")))?;

    let mut headers = settings.static_headers.clone();
    let credential = credential.trim();
    if !credential.is_empty() {
        let mut value = http::HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| BridgeError::Build("Access token is not a valid header value".into()))?;
        value.set_sensitive(true);
        headers.insert(http::header::AUTHORIZATION, value);
    }

    Ok(UpstreamCall {
        method: http::Method::POST,
        url: settings.endpoint.clone(),
        headers,
        body: Bytes::from(body),
        proxy: proxy
            .map(str::trim)
            .filter(|proxy| !proxy.is_empty())
            .map(str::to_string),
    })
}

/// Build the `GET` for the official model list.
#[must_use]
pub fn build_models_call(settings: &UpstreamSettings, proxy: Option<&str>) -> UpstreamCall {
    UpstreamCall {
        method: http::Method::GET,
        url: settings.models_endpoint.clone(),
        headers: settings.models_headers.clone(),
        body: Bytes::new(),
        proxy: proxy
            .map(str::trim)
            .filter(|proxy| !proxy.is_empty())
            .map(str::to_string),
    }
}
