//! Shared HTTP client construction policy.
//!
//! Page fetches (watch, search and info pages) and media streaming use
//! separate clients built here so both agree on User-Agent, compression and
//! proxy handling while keeping their own timeouts. Proxies come from the
//! usual `HTTP_PROXY`/`HTTPS_PROXY`/`ALL_PROXY` environment variables, which
//! is the supported way around the site's per-address request limit.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::debug;

/// Default connect timeout for page fetches.
pub const PAGE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-read timeout for page fetches.
pub const PAGE_READ_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout for media streaming.
pub const MEDIA_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-read timeout for media streaming (large files, slow CDNs).
pub const MEDIA_READ_TIMEOUT_SECS: u64 = 300;

/// Connect and read timeouts of one client.
///
/// The read timeout bounds each individual read, not the whole transfer, so
/// long episodes stream to completion as long as bytes keep arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Timeout for each read from the socket.
    pub read: Duration,
}

impl HttpTimeouts {
    /// Timeouts for page fetches.
    #[must_use]
    pub fn page() -> Self {
        Self::from_secs(PAGE_CONNECT_TIMEOUT_SECS, PAGE_READ_TIMEOUT_SECS)
    }

    /// Timeouts for media streaming.
    #[must_use]
    pub fn media() -> Self {
        Self::from_secs(MEDIA_CONNECT_TIMEOUT_SECS, MEDIA_READ_TIMEOUT_SECS)
    }

    /// Builds timeouts from whole seconds.
    #[must_use]
    pub fn from_secs(connect_secs: u64, read_secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect_secs),
            read: Duration::from_secs(read_secs),
        }
    }
}

/// Builds a client with the shared policy.
///
/// # Errors
///
/// Returns the builder's error when the TLS backend or proxy configuration
/// cannot be initialized.
pub fn build_http_client(user_agent: &str, timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    debug!(
        connect_timeout_secs = timeouts.connect.as_secs(),
        read_timeout_secs = timeouts.read.as_secs(),
        "building HTTP client"
    );
    let builder = Client::builder()
        .connect_timeout(timeouts.connect)
        .read_timeout(timeouts.read)
        .user_agent(user_agent)
        .gzip(true);
    apply_env_proxy_fallback(builder).build()
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        debug!(proxy = %proxy, "using HTTPS proxy from environment");
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        debug!(proxy = %proxy, "using HTTP proxy from environment");
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
