//! Environment variable handling and .env file management

use crate::error::{AppError, ErrorContext, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists; already-set variables win
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            if debug {
                for warning in Self::check_env_file(path)?.unwrap_or_default() {
                    eprintln!("{}: {}", path.display(), warning);
                }
            }

            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Commented-out `.env` template listing every supported variable
    pub fn create_example_env_content() -> String {
        let mut content = String::from(
            "# Network Speed Tester Configuration\n\
             #\n\
             # Shell variables override this file; command-line flags override both.\n",
        );
        for (name, description, example) in Self::get_supported_env_vars() {
            content.push_str(&format!("\n# {}\n# {}={}\n", description, name, example));
        }
        content
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "SPEEDTEST_SERVER_ID" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("SPEEDTEST_SERVER_ID cannot be empty"));
                }
            }
            "SPEEDTEST_SERVERS" => {
                parse_bounded(key, value, 0, 100)?;
            }
            "SPEEDTEST_TIMEOUT" => {
                parse_bounded(key, value, 1, 600)?;
            }
            "SPEEDTEST_LATENCY_SAMPLES" => {
                parse_bounded(key, value, 1, 100)?;
            }
            "SPEEDTEST_LATENCY_TIMEOUT_MS" => {
                parse_bounded(key, value, 1, 60_000)?;
            }
            "SPEEDTEST_DOWNLOAD_WORKERS" | "SPEEDTEST_UPLOAD_WORKERS" => {
                parse_bounded(key, value, 1, 64)?;
            }
            "SPEEDTEST_DOWNLOAD_DURATION" | "SPEEDTEST_UPLOAD_DURATION" => {
                parse_bounded(key, value, 1, 300)?;
            }
            "SPEEDTEST_UPLOAD_SIZE" => {
                parse_bounded(key, value, 1024, 256 * 1024 * 1024)?;
            }
            "SPEEDTEST_LOCATION_URL" | "SPEEDTEST_DIRECTORY_URL" => {
                check_http_url(key, value.trim())?;
            }
            "SPEEDTEST_DOWNLOAD_FALLBACK_URLS" | "SPEEDTEST_UPLOAD_FALLBACK_URLS" => {
                for url in value.split(',') {
                    let url = url.trim();
                    if !url.is_empty() {
                        check_http_url(key, url)?;
                    }
                }
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .with_context(|| format!("Invalid ENABLE_COLOR value '{}'", value))?;
            }
            "LOG_LEVEL" => {
                value.parse::<crate::logging::LogLevel>()
                    .map_err(|e| AppError::config(format!("Invalid LOG_LEVEL value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SPEEDTEST_SERVER_ID", "Test this server id, skipping ranking", "4242"),
            ("SPEEDTEST_SERVERS", "Nearest servers to probe (0 = all)", "5"),
            ("SPEEDTEST_TIMEOUT", "Overall deadline in seconds (1-600)", "60"),
            ("SPEEDTEST_LATENCY_SAMPLES", "Latency probes for the selected server", "5"),
            ("SPEEDTEST_LATENCY_TIMEOUT_MS", "Per-probe timeout in milliseconds", "5000"),
            ("SPEEDTEST_DOWNLOAD_WORKERS", "Concurrent download workers (1-64)", "4"),
            ("SPEEDTEST_DOWNLOAD_DURATION", "Download phase length in seconds", "10"),
            ("SPEEDTEST_UPLOAD_WORKERS", "Concurrent upload workers (1-64)", "2"),
            ("SPEEDTEST_UPLOAD_DURATION", "Upload phase length in seconds", "10"),
            ("SPEEDTEST_UPLOAD_SIZE", "Upload payload size in bytes", "10485760"),
            ("SPEEDTEST_LOCATION_URL", "Geolocation endpoint", "https://ipinfo.io/json"),
            ("SPEEDTEST_DIRECTORY_URL", "Server list endpoint", "https://www.speedtest.net/api/js/servers?engine=js&limit=10"),
            ("SPEEDTEST_DOWNLOAD_FALLBACK_URLS", "Extra download URLs (comma-separated)", "https://cdn.example.com/random4000x4000.jpg"),
            ("SPEEDTEST_UPLOAD_FALLBACK_URLS", "Extra upload URLs (comma-separated)", "https://cdn.example.com/upload"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
            ("LOG_LEVEL", "Log level on stderr", "warn"),
        ]
    }

    /// Validate the entries of an env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

fn parse_bounded(key: &str, value: &str, min: u64, max: u64) -> Result<u64> {
    let parsed: u64 = value.trim().parse()
        .with_context(|| format!("Invalid {} value '{}'", key, value))?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!("{} must be between {} and {}, got: {}", key, min, max, parsed)));
    }
    Ok(parsed)
}

fn check_http_url(key: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::config(format!("Invalid {} entry '{}': {}", key, value, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::config(format!("{} must use http or https: {}", key, value)));
    }
    Ok(())
}
