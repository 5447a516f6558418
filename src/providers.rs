use std::sync::atomic::{AtomicUsize, Ordering};

use http::header::AUTHORIZATION;

/// Supplies the bearer credential for one upstream call. May be empty.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> String;
}

/// Supplies the proxy for one upstream call, if any.
pub trait ProxyProvider: Send + Sync {
    fn proxy(&self) -> Option<String>;
}

/// Round-robin over a fixed token list.
pub struct StaticCredentials {
    tokens: Vec<String>,
    cursor: AtomicUsize,
}

impl StaticCredentials {
    #[must_use]
    pub fn new(tokens: Vec<String>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect();
        Self {
            tokens,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self) -> String {
        if self.tokens.is_empty() {
            return String::new();
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.tokens.len();
        self.tokens[idx].clone()
    }
}

/// Uniform random pick from a fixed proxy list.
pub struct ProxyList {
    proxies: Vec<String>,
}

impl ProxyList {
    #[must_use]
    pub fn new(proxies: Vec<String>) -> Self {
        let proxies = proxies
            .into_iter()
            .map(|proxy| proxy.trim().to_string())
            .filter(|proxy| !proxy.is_empty())
            .collect();
        Self { proxies }
    }
}

impl ProxyProvider for ProxyList {
    fn proxy(&self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        self.proxies.get(fastrand::usize(..self.proxies.len())).cloned()
    }
}

/// Bearer token supplied by the downstream client, if any.
#[must_use]
pub fn client_bearer(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Short form of a credential that is safe to log.
#[must_use]
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
