//! Configuration data model and validation

use crate::latency::ProbeConfig;
use crate::transfer::TransferConfig;
use crate::types::{AppError, Result, SpeedUnit};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Explicit server id; bypasses distance sort and latency ranking
    #[serde(default)]
    pub server_id: Option<String>,

    /// Number of nearest servers to latency-probe (0 probes all)
    #[serde(default = "default_servers_to_probe")]
    pub servers_to_probe: usize,

    /// Overall deadline for the whole run
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Probes issued for the final latency measurement
    #[serde(default = "default_latency_samples")]
    pub latency_samples: usize,

    /// Per-probe timeout
    #[serde(default = "default_latency_sample_timeout_ms")]
    pub latency_sample_timeout_ms: u64,

    /// Probes in flight at once against a single server
    #[serde(default = "default_latency_concurrency")]
    pub latency_concurrency: usize,

    /// Probes issued per server while ranking
    #[serde(default = "default_ranking_samples")]
    pub ranking_samples: usize,

    /// Servers probed in parallel while ranking
    #[serde(default = "default_ranking_parallel_servers")]
    pub ranking_parallel_servers: usize,

    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    #[serde(default = "default_download_duration_secs")]
    pub download_duration_seconds: u64,

    #[serde(default = "default_upload_workers")]
    pub upload_workers: usize,

    #[serde(default = "default_upload_duration_secs")]
    pub upload_duration_seconds: u64,

    /// Size of the random payload posted by every upload request
    #[serde(default = "default_upload_size_bytes")]
    pub upload_size_bytes: usize,

    /// Download read chunk size
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    /// How long in-flight requests may run after cancellation
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Geolocation endpoint returning `{"ip","loc","org"}`
    #[serde(default = "default_location_url")]
    pub location_url: String,

    /// Server directory endpoint
    #[serde(default = "default_directory_url")]
    pub directory_url: String,

    /// Extra download URLs cycled after the size ladder
    #[serde(default)]
    pub download_fallback_urls: Vec<String>,

    /// Extra upload URLs tried in order when the primary fails
    #[serde(default)]
    pub upload_fallback_urls: Vec<String>,

    /// Print the result as JSON
    #[serde(default)]
    pub json: bool,

    /// Report speeds in MB/s instead of Mbps
    #[serde(default)]
    pub bytes: bool,

    /// Show a live progress line during transfers
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Explicit log level, overriding the verbose/debug mapping
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_id: None,
            servers_to_probe: default_servers_to_probe(),
            timeout_seconds: default_timeout_secs(),
            latency_samples: default_latency_samples(),
            latency_sample_timeout_ms: default_latency_sample_timeout_ms(),
            latency_concurrency: default_latency_concurrency(),
            ranking_samples: default_ranking_samples(),
            ranking_parallel_servers: default_ranking_parallel_servers(),
            download_workers: default_download_workers(),
            download_duration_seconds: default_download_duration_secs(),
            upload_workers: default_upload_workers(),
            upload_duration_seconds: default_upload_duration_secs(),
            upload_size_bytes: default_upload_size_bytes(),
            chunk_size_bytes: default_chunk_size_bytes(),
            cancel_grace_ms: default_cancel_grace_ms(),
            location_url: default_location_url(),
            directory_url: default_directory_url(),
            download_fallback_urls: Vec::new(),
            upload_fallback_urls: Vec::new(),
            json: false,
            bytes: false,
            show_progress: default_show_progress(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            log_level: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Overall run deadline as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn speed_unit(&self) -> SpeedUnit {
        if self.bytes {
            SpeedUnit::MBps
        } else {
            SpeedUnit::Mbps
        }
    }

    /// Probe settings for the final latency measurement
    pub fn latency_probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            sample_count: self.latency_samples,
            per_sample_timeout: Duration::from_millis(self.latency_sample_timeout_ms),
            max_concurrency: self.latency_concurrency,
        }
    }

    /// Probe settings used per server while ranking
    pub fn ranking_probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            sample_count: self.ranking_samples,
            ..self.latency_probe_config()
        }
    }

    pub fn download_config(&self) -> TransferConfig {
        TransferConfig {
            workers: self.download_workers,
            duration: Duration::from_secs(self.download_duration_seconds),
            payload_size: 0,
            chunk_size: self.chunk_size_bytes,
            cancel_grace: self.cancel_grace(),
            fallback_urls: self.download_fallback_urls.clone(),
        }
    }

    pub fn upload_config(&self) -> TransferConfig {
        TransferConfig {
            workers: self.upload_workers,
            duration: Duration::from_secs(self.upload_duration_seconds),
            payload_size: self.upload_size_bytes,
            chunk_size: self.chunk_size_bytes,
            cancel_grace: self.cancel_grace(),
            fallback_urls: self.upload_fallback_urls.clone(),
        }
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.server_id {
            if id.trim().is_empty() {
                return Err(AppError::config("Server id cannot be empty"));
            }
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_seconds > 600 {
            return Err(AppError::config("Timeout cannot exceed 600 seconds"));
        }

        check_range("latency_samples", self.latency_samples, 1, 100)?;
        check_range("ranking_samples", self.ranking_samples, 1, 100)?;
        check_range("latency_concurrency", self.latency_concurrency, 1, 32)?;
        check_range("ranking_parallel_servers", self.ranking_parallel_servers, 1, 32)?;
        check_range("download_workers", self.download_workers, 1, 64)?;
        check_range("upload_workers", self.upload_workers, 1, 64)?;
        check_range("download_duration_seconds", self.download_duration_seconds as usize, 1, 300)?;
        check_range("upload_duration_seconds", self.upload_duration_seconds as usize, 1, 300)?;
        check_range("upload_size_bytes", self.upload_size_bytes, 1024, 256 * 1024 * 1024)?;
        check_range("chunk_size_bytes", self.chunk_size_bytes, 1024, 1024 * 1024)?;

        if self.latency_sample_timeout_ms == 0 {
            return Err(AppError::config("Latency sample timeout must be greater than 0"));
        }

        if self.cancel_grace_ms > 10_000 {
            return Err(AppError::config("Cancel grace period cannot exceed 10000 ms"));
        }

        validate_http_url("location_url", &self.location_url)?;
        validate_http_url("directory_url", &self.directory_url)?;
        for url in self.download_fallback_urls.iter().chain(self.upload_fallback_urls.iter()) {
            validate_http_url("fallback url", url)?;
        }

        if let Some(level) = &self.log_level {
            level.parse::<crate::logging::LogLevel>()
                .map_err(|_| AppError::config(format!("Invalid log level: {}", level)))?;
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(server_id) = std::env::var("SPEEDTEST_SERVER_ID") {
            let trimmed = server_id.trim();
            if !trimmed.is_empty() {
                self.server_id = Some(trimmed.to_string());
            }
        }

        env_number("SPEEDTEST_SERVERS", &mut self.servers_to_probe)?;
        env_number("SPEEDTEST_TIMEOUT", &mut self.timeout_seconds)?;
        env_number("SPEEDTEST_LATENCY_SAMPLES", &mut self.latency_samples)?;
        env_number("SPEEDTEST_LATENCY_TIMEOUT_MS", &mut self.latency_sample_timeout_ms)?;
        env_number("SPEEDTEST_DOWNLOAD_WORKERS", &mut self.download_workers)?;
        env_number("SPEEDTEST_DOWNLOAD_DURATION", &mut self.download_duration_seconds)?;
        env_number("SPEEDTEST_UPLOAD_WORKERS", &mut self.upload_workers)?;
        env_number("SPEEDTEST_UPLOAD_DURATION", &mut self.upload_duration_seconds)?;
        env_number("SPEEDTEST_UPLOAD_SIZE", &mut self.upload_size_bytes)?;

        if let Ok(url) = std::env::var("SPEEDTEST_LOCATION_URL") {
            self.location_url = url.trim().to_string();
        }

        if let Ok(url) = std::env::var("SPEEDTEST_DIRECTORY_URL") {
            self.directory_url = url.trim().to_string();
        }

        if let Ok(urls) = std::env::var("SPEEDTEST_DOWNLOAD_FALLBACK_URLS") {
            self.download_fallback_urls = split_list(&urls);
        }

        if let Ok(urls) = std::env::var("SPEEDTEST_UPLOAD_FALLBACK_URLS") {
            self.upload_fallback_urls = split_list(&urls);
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.log_level = Some(level.trim().to_string());
            }
        }

        Ok(())
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(AppError::config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", name, value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::config(format!(
            "{} must use http or https, got '{}'",
            name, other
        ))),
    }
}

fn env_number<T>(key: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *target = raw.trim().parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, raw, e)))?;
    }
    Ok(())
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Default value functions for serde
fn default_servers_to_probe() -> usize {
    crate::defaults::DEFAULT_SERVERS_TO_PROBE
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_latency_samples() -> usize {
    crate::defaults::DEFAULT_LATENCY_SAMPLES
}

fn default_latency_sample_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_LATENCY_SAMPLE_TIMEOUT.as_millis() as u64
}

fn default_latency_concurrency() -> usize {
    crate::defaults::DEFAULT_LATENCY_CONCURRENCY
}

fn default_ranking_samples() -> usize {
    crate::defaults::DEFAULT_RANKING_SAMPLES
}

fn default_ranking_parallel_servers() -> usize {
    crate::defaults::DEFAULT_RANKING_PARALLEL_SERVERS
}

fn default_download_workers() -> usize {
    crate::defaults::DEFAULT_DOWNLOAD_WORKERS
}

fn default_download_duration_secs() -> u64 {
    crate::defaults::DEFAULT_DOWNLOAD_DURATION.as_secs()
}

fn default_upload_workers() -> usize {
    crate::defaults::DEFAULT_UPLOAD_WORKERS
}

fn default_upload_duration_secs() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_DURATION.as_secs()
}

fn default_upload_size_bytes() -> usize {
    crate::defaults::DEFAULT_UPLOAD_SIZE_BYTES
}

fn default_chunk_size_bytes() -> usize {
    crate::defaults::DEFAULT_CHUNK_SIZE_BYTES
}

fn default_cancel_grace_ms() -> u64 {
    crate::defaults::DEFAULT_CANCEL_GRACE.as_millis() as u64
}

fn default_location_url() -> String {
    crate::defaults::DEFAULT_LOCATION_URL.to_string()
}

fn default_directory_url() -> String {
    crate::defaults::DEFAULT_DIRECTORY_URL.to_string()
}

fn default_show_progress() -> bool {
    true
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.servers_to_probe, 5);
        assert_eq!(config.latency_concurrency, 3);
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = Config::default();
        config.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = Config::default();
        config.download_workers = 0;
        assert!(config.validate().is_err());

        config.download_workers = 65;
        assert!(config.validate().is_err());

        config.download_workers = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_http_endpoint_invalid() {
        let mut config = Config::default();
        config.directory_url = "ftp://example.com/servers".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upload_fallback_urls = vec!["not a url".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_server_id_invalid() {
        let mut config = Config::default();
        config.server_id = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.log_level = Some("chatty".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_transfer_configs() {
        let mut config = Config::default();
        config.upload_size_bytes = 2 * 1024 * 1024;
        config.upload_duration_seconds = 7;

        let upload = config.upload_config();
        assert_eq!(upload.payload_size, 2 * 1024 * 1024);
        assert_eq!(upload.duration, Duration::from_secs(7));
        assert_eq!(upload.workers, config.upload_workers);

        let download = config.download_config();
        assert_eq!(download.chunk_size, 32 * 1024);
        assert_eq!(download.workers, 4);
    }

    #[test]
    fn test_ranking_probe_inherits_timeouts() {
        let mut config = Config::default();
        config.latency_sample_timeout_ms = 1234;
        let probe = config.ranking_probe_config();
        assert_eq!(probe.sample_count, config.ranking_samples);
        assert_eq!(probe.per_sample_timeout, Duration::from_millis(1234));
    }

    #[test]
    fn test_speed_unit_selection() {
        let mut config = Config::default();
        assert_eq!(config.speed_unit(), SpeedUnit::Mbps);
        config.bytes = true;
        assert_eq!(config.speed_unit(), SpeedUnit::MBps);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
