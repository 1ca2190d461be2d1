//! Machine-readable JSON output

use super::formatter::OutputFormatter;
use crate::{
    error::{AppError, ErrorReporter, Result},
    models::{AggregateResult, TransferRunResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Serialized shape of a finished run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub timestamp: DateTime<Utc>,
    pub ping: PingReport,
    pub download: TransferReport,
    pub upload: TransferReport,
    pub server: ServerReport,
    pub interface: InterfaceReport,
    pub isp: String,
}

#[derive(Debug, Serialize)]
pub struct PingReport {
    /// Milliseconds
    pub jitter: f64,
    /// Milliseconds
    pub latency: f64,
    pub samples: usize,
}

#[derive(Debug, Serialize)]
pub struct TransferReport {
    /// Smoothed bytes per second
    pub bandwidth: u64,
    pub bytes: u64,
    /// Milliseconds
    pub elapsed: u64,
}

#[derive(Debug, Serialize)]
pub struct ServerReport {
    pub id: String,
    pub host: String,
    pub name: String,
    pub location: String,
    pub country: String,
    pub sponsor: String,
    /// Kilometres from the detected location
    pub distance: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceReport {
    pub external_ip: String,
}

impl From<&TransferRunResult> for TransferReport {
    fn from(run: &TransferRunResult) -> Self {
        Self {
            bandwidth: run.bandwidth_bytes_per_sec,
            bytes: run.total_bytes,
            elapsed: run.elapsed_ms(),
        }
    }
}

impl From<&AggregateResult> for JsonReport {
    fn from(result: &AggregateResult) -> Self {
        let server = &result.server;
        Self {
            timestamp: result.timestamp,
            ping: PingReport {
                jitter: result.latency.jitter_ms,
                latency: result.latency.average_ms,
                samples: result.latency.sample_count,
            },
            download: TransferReport::from(&result.download),
            upload: TransferReport::from(&result.upload),
            server: ServerReport {
                id: server.id.clone(),
                host: server.host().to_string(),
                name: server.name.clone(),
                location: server.location_label(),
                country: server.country.clone(),
                sponsor: server.sponsor.clone(),
                distance: server.distance_km,
            },
            interface: InterfaceReport {
                external_ip: result.external_ip().to_string(),
            },
            isp: result.isp().to_string(),
        }
    }
}

/// Pretty-printed JSON formatter
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_result(&self, result: &AggregateResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(&JsonReport::from(result))?)
    }

    fn format_error(&self, error: &AppError) -> Result<String> {
        Ok(ErrorReporter::render_json(error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(serde_json::json!({ "warning": warning }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::sample_result;
    use crate::types::Phase;

    #[test]
    fn test_json_report_fields() {
        let output = JsonFormatter::new().format_result(&sample_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(value["ping"]["samples"], 5);
        assert_eq!(value["ping"]["jitter"], 1.5);
        assert_eq!(value["download"]["bandwidth"], 12_500_000);
        assert_eq!(value["download"]["bytes"], 125_000_000);
        assert_eq!(value["download"]["elapsed"], 10_000);
        assert_eq!(value["upload"]["bandwidth"], 1_250_000);
        assert_eq!(value["server"]["id"], "4242");
        assert_eq!(value["server"]["host"], "speed.example.com:8080");
        assert_eq!(value["server"]["location"], "New York, US");
        assert_eq!(value["server"]["distance"], 3.25);
        assert_eq!(value["interface"]["externalIp"], "203.0.113.7");
        assert_eq!(value["isp"], "Example ISP");
    }

    #[test]
    fn test_json_error() {
        let error = AppError::server_not_found("99").in_phase(Phase::SelectingServer);
        let output = JsonFormatter::new().format_error(&error).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(value["error"].as_str().unwrap().contains("99"));
        assert_eq!(value["phase"], "selection");
    }
}
