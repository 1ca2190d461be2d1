//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Phases of a full speed test run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Detecting the caller's public IP and coordinates
    LocatingUser,
    /// Fetching the candidate server list
    FetchingServers,
    /// Distance sort and latency ranking
    SelectingServer,
    /// Final latency measurement against the chosen server
    MeasuringLatency,
    /// Download throughput test
    MeasuringDownload,
    /// Upload throughput test
    MeasuringUpload,
    /// Result assembled
    Done,
}

impl Phase {
    /// Short label used in progress lines and log fields
    pub fn label(&self) -> &'static str {
        match self {
            Phase::LocatingUser => "location",
            Phase::FetchingServers => "servers",
            Phase::SelectingServer => "selection",
            Phase::MeasuringLatency => "latency",
            Phase::MeasuringDownload => "download",
            Phase::MeasuringUpload => "upload",
            Phase::Done => "done",
        }
    }

    /// Whether this phase streams transfer progress snapshots
    pub fn is_transfer(&self) -> bool {
        matches!(self, Phase::MeasuringDownload | Phase::MeasuringUpload)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of a throughput test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Download,
    Upload,
}

impl TransferDirection {
    pub fn phase(&self) -> Phase {
        match self {
            TransferDirection::Download => Phase::MeasuringDownload,
            TransferDirection::Upload => Phase::MeasuringUpload,
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Download => f.write_str("download"),
            TransferDirection::Upload => f.write_str("upload"),
        }
    }
}

/// Unit used when rendering throughput
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeedUnit {
    /// Megabits per second (bytes * 8 / 10^6)
    #[default]
    Mbps,
    /// Mebibytes per second (bytes / 2^20)
    MBps,
}

impl SpeedUnit {
    /// Convert a bytes-per-second rate into this unit
    pub fn convert(&self, bytes_per_sec: f64) -> f64 {
        match self {
            SpeedUnit::Mbps => bytes_per_sec * 8.0 / 1_000_000.0,
            SpeedUnit::MBps => bytes_per_sec / 1_048_576.0,
        }
    }

    /// Render a rate with two decimals and the unit suffix
    pub fn format(&self, bytes_per_sec: f64) -> String {
        format!("{:.2} {}", self.convert(bytes_per_sec), self.suffix())
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            SpeedUnit::Mbps => "Mbps",
            SpeedUnit::MBps => "MB/s",
        }
    }
}
