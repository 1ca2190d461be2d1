//! HTTP client construction for probes, transfers and API lookups

#[cfg(test)]
pub(crate) mod mock_server;

use crate::error::{AppError, Result};
use reqwest::Client;
use std::time::Duration;

/// User agent sent by every request
pub const USER_AGENT: &str = concat!("network-speed-tester/", env!("CARGO_PKG_VERSION"));

/// Timeouts shared by all clients built by a [`ClientFactory`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// TCP + TLS connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout for upload POSTs
    pub upload_timeout: Duration,
    /// Whole-request timeout for location and directory lookups
    pub api_timeout: Duration,
    /// Maximum idle connections kept per host
    pub max_idle_per_host: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(60),
            api_timeout: Duration::from_secs(15),
            max_idle_per_host: 16,
        }
    }
}

/// HTTP client factory for the different request profiles.
///
/// Certificate validation is never disabled.
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    settings: ClientSettings,
}

impl ClientFactory {
    /// Create a new client factory
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.settings.connect_timeout)
            .pool_max_idle_per_host(self.settings.max_idle_per_host)
            .use_rustls_tls()
    }

    fn build(builder: reqwest::ClientBuilder, purpose: &str) -> Result<Client> {
        builder
            .build()
            .map_err(|e| AppError::config(format!("Failed to build {} HTTP client: {}", purpose, e)))
    }

    /// Client for latency probes, bounded by the per-sample timeout
    pub fn probe_client(&self, per_sample_timeout: Duration) -> Result<Client> {
        Self::build(self.builder().timeout(per_sample_timeout), "probe")
    }

    /// Client for streamed downloads.
    ///
    /// No whole-request timeout: body reads are bounded by the test deadline.
    pub fn download_client(&self) -> Result<Client> {
        Self::build(self.builder(), "download")
    }

    /// Client for upload POSTs
    pub fn upload_client(&self) -> Result<Client> {
        Self::build(self.builder().timeout(self.settings.upload_timeout), "upload")
    }

    /// Client for location and directory lookups
    pub fn api_client(&self) -> Result<Client> {
        Self::build(self.builder().timeout(self.settings.api_timeout), "api")
    }
}

/// URL helpers shared by the directory and the testers
pub struct HttpUtils;

impl HttpUtils {
    /// Derive a server base URL from a directory upload URL.
    ///
    /// Adds `http://` when the scheme is missing and cuts everything from
    /// `/speedtest/` onwards, so `host:8080/speedtest/upload.php` becomes
    /// `http://host:8080`.
    pub fn server_base_url(raw: &str) -> String {
        let raw = raw.trim();
        let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let base = match with_scheme.find("/speedtest/") {
            Some(idx) => &with_scheme[..idx],
            None => with_scheme.as_str(),
        };

        base.trim_end_matches('/').to_string()
    }
}
