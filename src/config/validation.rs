//! Configuration validation utilities and rules

use crate::{
    error::{AppError, Result},
    models::Config,
};

/// Configuration validator with advisory checks on top of `Config::validate`
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard checks, then collect non-fatal warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        config.validate()?;

        warnings.extend(Self::validate_endpoints(config)?);
        warnings.extend(Self::validate_transfer_settings(config));
        warnings.extend(Self::validate_time_budget(config));

        Ok(warnings)
    }

    /// Check the location, directory and fallback endpoints
    fn validate_endpoints(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        let endpoints = [&config.location_url, &config.directory_url]
            .into_iter()
            .chain(config.download_fallback_urls.iter())
            .chain(config.upload_fallback_urls.iter());

        for url in endpoints {
            let parsed = url::Url::parse(url)
                .map_err(|e| AppError::config(format!("Invalid URL '{}': {}", url, e)))?;

            if parsed.scheme() == "http" {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("URL '{}' uses HTTP instead of HTTPS", url),
                ));
            }

            if let Some(url::Host::Ipv4(ip)) = parsed.host() {
                if ip.is_private() || ip.is_loopback() {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!("URL '{}' targets private/local network", url),
                    ));
                }
            }
        }

        Ok(warnings)
    }

    /// Flag settings that make throughput figures unreliable
    fn validate_transfer_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (name, seconds) in [
            ("Download", config.download_duration_seconds),
            ("Upload", config.upload_duration_seconds),
        ] {
            if seconds < 3 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("{} duration of {}s is too short for the rate estimate to settle (recommended: >= 3s)", name, seconds),
                ));
            }
        }

        if config.upload_size_bytes < 1024 * 1024 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Upload payload of {} bytes is small; request overhead will dominate the measurement",
                    config.upload_size_bytes
                ),
            ));
        }

        if config.latency_samples < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} latency samples give a rough jitter figure (recommended: >= 3)", config.latency_samples),
            ));
        }

        if config.server_id.is_some() && config.servers_to_probe != crate::defaults::DEFAULT_SERVERS_TO_PROBE {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "An explicit server id is set; the servers-to-probe setting is ignored".to_string(),
            ));
        }

        warnings
    }

    /// Warn when the phases cannot fit in the overall deadline
    fn validate_time_budget(config: &Config) -> Vec<ValidationWarning> {
        let transfers = config.download_duration_seconds + config.upload_duration_seconds;
        if transfers >= config.timeout_seconds {
            vec![ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Transfer phases take {}s but the overall timeout is {}s; the run will be cut short",
                    transfers, config.timeout_seconds
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        if use_color {
            use colored::Colorize;
            let tag = match self.level {
                ValidationLevel::Info => self.level.as_str().blue(),
                ValidationLevel::Warning => self.level.as_str().yellow(),
                ValidationLevel::Error => self.level.as_str().red(),
            };
            format!("[{}] {}", tag, self.message)
        } else {
            format!("[{}] {}", self.level.as_str(), self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
