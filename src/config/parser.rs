//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that layers defaults, `.env`, environment and CLI
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        // .env values never override variables already set in the environment
        EnvManager::load_env_file(self.cli.debug)?;

        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(ref server) = cli.server {
            config.server_id = Some(server.trim().to_string());
        }
        if let Some(servers) = cli.servers {
            config.servers_to_probe = servers;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(secs) = cli.download_duration {
            config.download_duration_seconds = secs;
        }
        if let Some(secs) = cli.upload_duration {
            config.upload_duration_seconds = secs;
        }
        if let Some(workers) = cli.download_workers {
            config.download_workers = workers;
        }
        if let Some(workers) = cli.upload_workers {
            config.upload_workers = workers;
        }
        if let Some(size) = cli.upload_size {
            config.upload_size_bytes = size;
        }

        if cli.no_color {
            config.enable_color = false;
        }
        if cli.no_progress {
            config.show_progress = false;
        }

        // CLI-only switches
        config.json = cli.json;
        config.bytes = cli.bytes;
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    match &config.server_id {
        Some(id) => summary.push(format!("Server: {} (explicit)", id)),
        None => summary.push(format!("Servers to probe: {}", config.servers_to_probe)),
    }
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    summary.push(format!(
        "Latency: {} samples, {}ms timeout, {} concurrent",
        config.latency_samples, config.latency_sample_timeout_ms, config.latency_concurrency
    ));
    summary.push(format!(
        "Download: {} workers for {}s",
        config.download_workers, config.download_duration_seconds
    ));
    summary.push(format!(
        "Upload: {} workers for {}s, {} byte payload",
        config.upload_workers, config.upload_duration_seconds, config.upload_size_bytes
    ));
    summary.push(format!("Location URL: {}", config.location_url));
    summary.push(format!("Directory URL: {}", config.directory_url));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::env;
    use std::sync::Mutex;

    // Tests here touch process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let cli = Cli::parse_from([
            "nst", "--server", "42", "--timeout", "90", "--download-workers", "6",
            "--upload-size", "2M", "--no-color", "--no-progress", "--bytes",
        ]);
        let config = ConfigParser::new(cli).parse().unwrap();

        assert_eq!(config.server_id.as_deref(), Some("42"));
        assert_eq!(config.timeout_seconds, 90);
        assert_eq!(config.download_workers, 6);
        assert_eq!(config.upload_size_bytes, 2 * 1024 * 1024);
        assert!(!config.enable_color);
        assert!(!config.show_progress);
        assert!(config.bytes);
        assert_eq!(config.upload_workers, crate::defaults::DEFAULT_UPLOAD_WORKERS);
    }

    #[test]
    fn test_env_then_cli_precedence() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        env::set_var("SPEEDTEST_DOWNLOAD_WORKERS", "8");
        env::set_var("SPEEDTEST_UPLOAD_WORKERS", "5");

        let cli = Cli::parse_from(["nst", "--download-workers", "12"]);
        let config = ConfigParser::new(cli).parse().unwrap();

        // CLI beats environment, environment beats defaults
        assert_eq!(config.download_workers, 12);
        assert_eq!(config.upload_workers, 5);

        clear_env();
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        env::set_var("SPEEDTEST_TIMEOUT", "soon");
        let result = ConfigParser::new(Cli::parse_from(["nst"])).parse();
        clear_env();

        assert!(matches!(result, Err(crate::error::AppError::Config(_))));
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());
        assert!(summary.contains("Servers to probe: 5"));
        assert!(summary.contains("Timeout: 60s"));
        assert!(summary.contains("Download: 4 workers for 10s"));

        let pinned = Config {
            server_id: Some("77".to_string()),
            ..Config::default()
        };
        assert!(display_config_summary(&pinned).contains("Server: 77 (explicit)"));
    }
}
