//! Measurement result data models

use crate::models::server::{CandidateServer, UserLocation};
use crate::types::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Latency reduced from a set of successful probe samples.
///
/// Only built from at least one sample; see [`crate::stats::latency_stat`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStat {
    /// Mean round trip in milliseconds
    pub average_ms: f64,
    /// Population standard deviation in milliseconds
    pub jitter_ms: f64,
    /// Number of successful samples, always at least 1
    pub sample_count: usize,
}

/// Outcome of one download or upload phase
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransferRunResult {
    /// Final smoothed rate estimate, not `total_bytes / elapsed`
    pub bandwidth_bytes_per_sec: u64,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl TransferRunResult {
    /// Flat average over the whole run, for comparison with the smoothed figure
    pub fn average_bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Live snapshot emitted while a transfer phase runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferProgress {
    pub phase: Phase,
    pub rate_bytes_per_sec: f64,
    pub bytes_total: u64,
    pub elapsed: Duration,
}

/// Final record of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub timestamp: DateTime<Utc>,
    pub latency: LatencyStat,
    pub download: TransferRunResult,
    pub upload: TransferRunResult,
    pub server: CandidateServer,
    pub location: UserLocation,
}

impl AggregateResult {
    pub fn isp(&self) -> &str {
        &self.location.isp
    }

    pub fn external_ip(&self) -> &str {
        &self.location.ip
    }
}
