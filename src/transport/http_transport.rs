use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::ServerConfig;
use crate::error::BridgeError;

use super::request_builder::UpstreamCall;

const PROXY_CLIENT_CACHE_MAX_ENTRIES: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, BridgeError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| BridgeError::Transport(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| BridgeError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Outbound HTTP client pool.
///
/// Each proxy gets its own immutable client; a call never mutates shared
/// client state to pick a route.
pub struct HttpTransport {
    base_client: OnceLock<Arc<reqwest::Client>>,
    preconfigured_proxy_clients: FxHashMap<String, Arc<reqwest::Client>>,
    dynamic_proxy_clients: RwLock<FxHashMap<String, Arc<reqwest::Client>>>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
    use_env_proxy: bool,
}

impl HttpTransport {
    /// Create a transport with pooling and timeouts from the server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_proxies(config, std::iter::empty::<&str>())
    }

    /// Create a transport with eagerly built clients for the given proxies.
    #[must_use]
    pub fn with_proxies<I, S>(config: &ServerConfig, proxy_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let pool_max_idle_per_host = config.http_pool_max_idle_per_host.max(1);
        let timeout = Duration::from_secs(config.timeout);
        let use_env_proxy = config.http_use_env_proxy;
        let preconfigured_proxy_clients = Self::build_preconfigured_proxy_clients(
            proxy_urls,
            pool_max_idle_per_host,
            pool_idle_timeout,
            timeout,
            use_env_proxy,
        );
        Self {
            base_client: OnceLock::new(),
            preconfigured_proxy_clients,
            dynamic_proxy_clients: RwLock::new(FxHashMap::default()),
            pool_max_idle_per_host,
            pool_idle_timeout,
            timeout,
            use_env_proxy,
        }
    }

    fn build_preconfigured_proxy_clients<I, S>(
        proxy_urls: I,
        pool_max_idle_per_host: usize,
        pool_idle_timeout: Option<Duration>,
        timeout: Duration,
        use_env_proxy: bool,
    ) -> FxHashMap<String, Arc<reqwest::Client>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut clients = FxHashMap::default();
        for proxy_url in proxy_urls {
            let proxy_url = proxy_url.as_ref().trim();
            if proxy_url.is_empty() || clients.contains_key(proxy_url) {
                continue;
            }
            match build_reqwest_client(
                pool_max_idle_per_host,
                pool_idle_timeout,
                timeout,
                use_env_proxy,
                Some(proxy_url),
            ) {
                Ok(client) => {
                    clients.insert(proxy_url.to_owned(), Arc::new(client));
                }
                Err(err) => {
                    tracing::error!(
                        proxy_url,
                        error = %err,
                        "failed to prebuild proxy HTTP client, falling back to lazy build"
                    );
                }
            }
        }
        clients
    }

    fn base_client(&self) -> Arc<reqwest::Client> {
        if let Some(existing) = self.base_client.get() {
            return existing.clone();
        }

        let built = match build_reqwest_client(
            self.pool_max_idle_per_host,
            self.pool_idle_timeout,
            self.timeout,
            self.use_env_proxy,
            None,
        ) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured HTTP client, falling back to default client");
                Arc::new(reqwest::Client::new())
            }
        };
        let _ = self.base_client.set(built.clone());
        self.base_client.get().cloned().unwrap_or(built)
    }

    fn client_for_proxy(&self, proxy_url: Option<&str>) -> Result<Arc<reqwest::Client>, BridgeError> {
        let Some(proxy_url) = proxy_url else {
            return Ok(self.base_client());
        };

        if let Some(existing) = self.preconfigured_proxy_clients.get(proxy_url) {
            return Ok(existing.clone());
        }

        if let Some(existing) = self.dynamic_proxy_clients.read().get(proxy_url) {
            return Ok(existing.clone());
        }

        let client = build_reqwest_client(
            self.pool_max_idle_per_host,
            self.pool_idle_timeout,
            self.timeout,
            self.use_env_proxy,
            Some(proxy_url),
        )
        .map(Arc::new)?;

        let mut cache = self.dynamic_proxy_clients.write();
        if let Some(existing) = cache.get(proxy_url) {
            return Ok(existing.clone());
        }
        if cache.len() >= PROXY_CLIENT_CACHE_MAX_ENTRIES {
            cache.clear();
        }
        cache.insert(proxy_url.to_string(), client.clone());
        Ok(client)
    }

    /// Execute `call` once and return the response with its body unread.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the proxy client cannot be
    /// built or the request fails before a status line arrives.
    pub async fn send(&self, call: &UpstreamCall) -> Result<reqwest::Response, BridgeError> {
        let client = self.client_for_proxy(call.proxy.as_deref())?;
        let mut request = reqwest::Request::new(call.method.clone(), call.url.clone());
        *request.headers_mut() = call.headers.clone();
        *request.body_mut() = Some(reqwest::Body::from(call.body.clone()));

        client.execute(request).await.map_err(|err| {
            tracing::warn!(
                error = %err,
                via_proxy = call.proxy.is_some(),
                "upstream request failed"
            );
            BridgeError::Transport(format!("Upstream request failed: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_client_is_lazy() {
        let transport = HttpTransport::new(&ServerConfig::default());
        assert!(transport.base_client.get().is_none());
        let _ = transport.client_for_proxy(None).unwrap();
        assert!(transport.base_client.get().is_some());
    }

    #[test]
    fn proxy_client_cache_hit() {
        let transport = HttpTransport::new(&ServerConfig::default());
        let first = transport
            .client_for_proxy(Some("http://127.0.0.1:3128"))
            .unwrap();
        let second = transport
            .client_for_proxy(Some("http://127.0.0.1:3128"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.dynamic_proxy_clients.read().len(), 1);
    }

    #[test]
    fn distinct_proxies_get_distinct_clients() {
        let transport = HttpTransport::new(&ServerConfig::default());
        let first = transport
            .client_for_proxy(Some("http://127.0.0.1:3128"))
            .unwrap();
        let second = transport
            .client_for_proxy(Some("http://127.0.0.1:3129"))
            .unwrap();
        let direct = transport.client_for_proxy(None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &direct));
    }

    #[test]
    fn preconfigured_proxy_client_hit() {
        let transport = HttpTransport::with_proxies(
            &ServerConfig::default(),
            ["http://127.0.0.1:3128", " ", "http://127.0.0.1:3128"],
        );
        let first = transport
            .client_for_proxy(Some("http://127.0.0.1:3128"))
            .unwrap();
        let second = transport
            .client_for_proxy(Some("http://127.0.0.1:3128"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.preconfigured_proxy_clients.len(), 1);
        assert!(transport.dynamic_proxy_clients.read().is_empty());
    }

    #[test]
    fn dynamic_cache_is_bounded() {
        let transport = HttpTransport::new(&ServerConfig::default());
        for port in 0..(PROXY_CLIENT_CACHE_MAX_ENTRIES + 8) {
            let proxy = format!("http://127.0.0.1:{}", 20_000 + port);
            let _ = transport.client_for_proxy(Some(&proxy)).unwrap();
        }
        assert!(transport.dynamic_proxy_clients.read().len() <= PROXY_CLIENT_CACHE_MAX_ENTRIES);
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&ServerConfig::default());
        let call = UpstreamCall {
            method: http::Method::POST,
            url: url::Url::parse(&format!("http://{addr}/backend-api/conversation")).unwrap(),
            headers: http::HeaderMap::new(),
            body: bytes::Bytes::from_static(b"{}"),
            proxy: None,
        };
        let err = transport.send(&call).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }
}
