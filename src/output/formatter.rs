//! Core formatting trait and the plain text implementation

use crate::{
    error::{AppError, ErrorReporter, Result},
    models::{AggregateResult, TransferRunResult},
    types::SpeedUnit,
};
use std::fmt::Write as _;

/// Renders a finished run for the terminal or for scripts
pub trait OutputFormatter: Send + Sync {
    /// Format the final result
    fn format_result(&self, result: &AggregateResult) -> Result<String>;

    /// Format a fatal error
    fn format_error(&self, error: &AppError) -> Result<String>;

    /// Format a non-fatal warning
    fn format_warning(&self, warning: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show server, jitter and transfer totals
    pub verbose_mode: bool,
    /// Unit for throughput figures
    pub unit: SpeedUnit,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            unit: SpeedUnit::Mbps,
        }
    }
}

/// Width of the right-aligned label column
pub(crate) const LABEL_WIDTH: usize = 10;

/// Right-align `label` so values line up under each other
pub(crate) fn labelled(label: &str, value: &str) -> String {
    format!("{:>width$} {}", label, value, width = LABEL_WIDTH)
}

/// Human-readable byte count, binary multiples
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Totals shown after a speed in verbose mode
pub(crate) fn transfer_details(run: &TransferRunResult) -> String {
    format!("({} in {:.2}s)", format_bytes(run.total_bytes), run.elapsed.as_secs_f64())
}

/// "host (Name, Country) [12.34 km]"
pub(crate) fn server_line(result: &AggregateResult) -> String {
    let server = &result.server;
    let mut line = server.host().to_string();
    let label = server.location_label();
    if !label.is_empty() {
        let _ = write!(line, " ({})", label);
    }
    let _ = write!(line, " [{:.2} km]", server.distance_km);
    line
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_result(&self, result: &AggregateResult) -> Result<String> {
        let unit = self.options.unit;
        let mut lines = Vec::new();

        if self.options.verbose_mode {
            lines.push(labelled("Server", &server_line(result)));
            if !result.server.sponsor.is_empty() {
                lines.push(labelled("Sponsor", &result.server.sponsor));
            }
            if !result.isp().is_empty() {
                lines.push(labelled("ISP", result.isp()));
            }
        }

        let ping = if self.options.verbose_mode {
            format!(
                "{:.2} ms (jitter {:.2} ms, {} samples)",
                result.latency.average_ms, result.latency.jitter_ms, result.latency.sample_count
            )
        } else {
            format!("{:.2} ms", result.latency.average_ms)
        };
        lines.push(labelled("Ping", &ping));

        for (label, run) in [("Download", &result.download), ("Upload", &result.upload)] {
            let mut value = unit.format(run.bandwidth_bytes_per_sec as f64);
            if self.options.verbose_mode {
                value.push(' ');
                value.push_str(&transfer_details(run));
            }
            lines.push(labelled(label, &value));
        }

        Ok(lines.join("\n"))
    }

    fn format_error(&self, error: &AppError) -> Result<String> {
        Ok(format!("Error: {}", ErrorReporter::new(false, self.options.verbose_mode).render(error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("Warning: {}", warning))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{CandidateServer, LatencyStat, UserLocation};
    use crate::types::Phase;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    pub(crate) fn sample_result() -> AggregateResult {
        AggregateResult {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            latency: LatencyStat {
                average_ms: 12.346,
                jitter_ms: 1.5,
                sample_count: 5,
            },
            download: TransferRunResult {
                bandwidth_bytes_per_sec: 12_500_000,
                total_bytes: 125_000_000,
                elapsed: Duration::from_secs(10),
            },
            upload: TransferRunResult {
                bandwidth_bytes_per_sec: 1_250_000,
                total_bytes: 12_500_000,
                elapsed: Duration::from_secs(10),
            },
            server: {
                let mut server = CandidateServer::new("4242", "http://speed.example.com:8080", 40.7, -74.0)
                    .with_metadata("New York", "US", "Example Telecom");
                server.distance_km = 3.25;
                server
            },
            location: UserLocation {
                ip: "203.0.113.7".to_string(),
                lat: 40.71,
                lon: -74.0,
                isp: "Example ISP".to_string(),
            },
        }
    }

    #[test]
    fn test_plain_result_lines() {
        let formatter = PlainFormatter::new(FormattingOptions::default());
        let output = formatter.format_result(&sample_result()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines, vec![
            "      Ping 12.35 ms",
            "  Download 100.00 Mbps",
            "    Upload 10.00 Mbps",
        ]);
    }

    #[test]
    fn test_plain_result_in_bytes() {
        let formatter = PlainFormatter::new(FormattingOptions {
            unit: SpeedUnit::MBps,
            ..Default::default()
        });
        let output = formatter.format_result(&sample_result()).unwrap();
        assert!(output.contains("  Download 11.92 MB/s"));
    }

    #[test]
    fn test_verbose_adds_server_and_totals() {
        let formatter = PlainFormatter::new(FormattingOptions {
            verbose_mode: true,
            ..Default::default()
        });
        let output = formatter.format_result(&sample_result()).unwrap();
        assert!(output.contains("    Server speed.example.com:8080 (New York, US) [3.25 km]"));
        assert!(output.contains("       ISP Example ISP"));
        assert!(output.contains("jitter 1.50 ms, 5 samples"));
        assert!(output.contains("(119.2 MB in 10.00s)"));
    }

    #[test]
    fn test_plain_error_has_no_escape_codes() {
        let formatter = PlainFormatter::new(FormattingOptions::default());
        let error = AppError::location_unavailable("offline").in_phase(Phase::LocatingUser);
        let output = formatter.format_error(&error).unwrap();
        assert!(!output.contains('\u{1b}'));
        assert!(output.starts_with("Error: [LOCATION]"));
        assert!(output.contains("offline"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MB");
    }
}
