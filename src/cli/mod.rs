//! Command-line interface

use clap::Parser;

/// Network Speed Tester - measure latency, download and upload throughput
#[derive(Parser, Debug, Clone)]
#[command(name = "nst")]
#[command(version = crate::VERSION, long_version = crate::LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Print the result as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Report speeds in MB/s instead of Mbps
    #[arg(short, long)]
    pub bytes: bool,

    /// Show server details, jitter and transfer totals
    #[arg(short, long)]
    pub verbose: bool,

    /// Test this server id instead of ranking the nearest servers
    #[arg(short, long = "server", value_name = "ID")]
    pub server: Option<String>,

    /// Nearest servers to latency-probe (0 probes all)
    #[arg(short = 'n', long = "servers", value_name = "N")]
    pub servers: Option<usize>,

    /// Overall deadline for the whole run, in seconds
    #[arg(short, long, value_name = "SECONDS", value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Download phase length in seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_duration)]
    pub download_duration: Option<u64>,

    /// Upload phase length in seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_duration)]
    pub upload_duration: Option<u64>,

    /// Concurrent download workers
    #[arg(long, value_name = "N", value_parser = parse_workers)]
    pub download_workers: Option<usize>,

    /// Concurrent upload workers
    #[arg(long, value_name = "N", value_parser = parse_workers)]
    pub upload_workers: Option<usize>,

    /// Upload payload per request, e.g. 10M, 512K or a byte count
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub upload_size: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging on stderr
    #[arg(long)]
    pub debug: bool,

    /// Hide the live progress line
    #[arg(long)]
    pub no_progress: bool,

    /// Print a commented .env template and exit
    #[arg(long)]
    pub env_template: bool,
}

impl Cli {
    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && !self.json && crate::output::terminal_supports_color()
    }
}

/// Parse the overall timeout in seconds
fn parse_timeout(s: &str) -> Result<u64, String> {
    parse_seconds(s, 600)
}

/// Parse a phase duration in seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    parse_seconds(s, 300)
}

fn parse_seconds(s: &str, max: u64) -> Result<u64, String> {
    // Reject strings with leading + sign or other invalid formats
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > max {
                Err(format!("Duration cannot exceed {} seconds", max))
            } else {
                Ok(secs)
            }
        })
}

fn parse_workers(s: &str) -> Result<usize, String> {
    s.parse::<usize>()
        .map_err(|_| format!("Invalid worker count: {}", s))
        .and_then(|n| {
            if n == 0 || n > 64 {
                Err("Worker count must be between 1 and 64".to_string())
            } else {
                Ok(n)
            }
        })
}

/// Parse a byte size with an optional binary K/M suffix
fn parse_size(s: &str) -> Result<usize, String> {
    let trimmed = s.trim();
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k' | 'K') => (&trimmed[..trimmed.len() - 1], 1024),
        Some('m' | 'M') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        _ => (trimmed, 1),
    };

    let value: usize = digits
        .parse()
        .map_err(|_| format!("Invalid size: {}", s))?;
    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", s))?;

    if bytes < 1024 {
        Err("Upload size must be at least 1K".to_string())
    } else if bytes > 256 * 1024 * 1024 {
        Err("Upload size cannot exceed 256M".to_string())
    } else {
        Ok(bytes)
    }
}
