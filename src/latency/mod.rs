//! HTTP latency probing
//!
//! A probe is one GET of `/speedtest/latency.txt` timed up to the response
//! headers. Only success statuses count as samples; failures, timeouts and
//! error statuses contribute nothing.

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::LatencyStat,
    stats,
};
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// How many probes to send and how
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeConfig {
    pub sample_count: usize,
    pub per_sample_timeout: Duration,
    /// Probes in flight at once
    pub max_concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            sample_count: crate::defaults::DEFAULT_LATENCY_SAMPLES,
            per_sample_timeout: crate::defaults::DEFAULT_LATENCY_SAMPLE_TIMEOUT,
            max_concurrency: crate::defaults::DEFAULT_LATENCY_CONCURRENCY,
        }
    }
}

/// Latency endpoint on a server
pub fn latency_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), crate::defaults::LATENCY_PATH)
}

/// Issues bounded-concurrency probes and reduces them to a [`LatencyStat`]
#[derive(Clone)]
pub struct LatencyProbe {
    client: Client,
    logger: Logger,
}

impl LatencyProbe {
    pub fn new(client: Client, logger: Logger) -> Self {
        Self { client, logger }
    }

    /// Probe `base_url` and reduce the successful samples.
    ///
    /// Fails with `NoSuccessfulSamples` when no probe succeeded, or with
    /// `Cancelled` when `cancel` fired before any sample was taken.
    pub async fn measure(
        &self,
        base_url: &str,
        config: &ProbeConfig,
        cancel: &CancellationToken,
    ) -> Result<LatencyStat> {
        if config.sample_count == 0 || config.max_concurrency == 0 {
            return Err(AppError::validation("Probe sample count and concurrency must be greater than 0"));
        }

        let url = latency_url(base_url);
        let gate = Arc::new(Semaphore::new(config.max_concurrency));

        let probes = (0..config.sample_count).map(|_| {
            let gate = gate.clone();
            let url = url.as_str();
            async move {
                let _permit = gate.acquire().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    sample = self.probe_once(url, config.per_sample_timeout) => sample,
                }
            }
        });

        let samples: Vec<Duration> = join_all(probes).await.into_iter().flatten().collect();

        if samples.is_empty() && cancel.is_cancelled() {
            return Err(AppError::cancelled(format!("latency probing of {} was cancelled", base_url)));
        }

        let stat = stats::latency_stat(base_url, &samples)?;

        self.logger.debug(&format!("Latency to {}", base_url))
            .latency(&stat)
            .field("requested", config.sample_count)
            .log()
            .await;

        Ok(stat)
    }

    /// One timed request; `None` unless the server answered with success
    async fn probe_once(&self, url: &str, per_sample_timeout: Duration) -> Option<Duration> {
        let start = Instant::now();
        let outcome = tokio::time::timeout(per_sample_timeout, self.client.get(url).send()).await;

        match outcome {
            Ok(Ok(response)) if response.status().is_success() => Some(start.elapsed()),
            Ok(Ok(response)) => {
                self.logger.trace("probe rejected")
                    .field("url", url)
                    .field("status", response.status().as_u16())
                    .log()
                    .await;
                None
            }
            Ok(Err(e)) => {
                self.logger.trace("probe failed")
                    .field("url", url)
                    .field("error", e.to_string())
                    .log()
                    .await;
                None
            }
            Err(_) => {
                self.logger.trace("probe timed out")
                    .field("url", url)
                    .field("timeout_ms", per_sample_timeout.as_millis() as u64)
                    .log()
                    .await;
                None
            }
        }
    }
}
