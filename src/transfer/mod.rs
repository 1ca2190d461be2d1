//! Time-boxed concurrent transfer tests
//!
//! Both directions share one harness:
//! - a child cancellation token that also fires at `now + duration`
//! - `workers` spawned tasks looping until that token is cancelled
//! - a [`SharedRate`] fed by every worker
//! - an optional progress ticker publishing [`TransferProgress`] snapshots
//!
//! The reported bandwidth is the final smoothed estimate.

pub mod download;
pub mod rate;
pub mod upload;

pub use download::DownloadTester;
pub use rate::{RateEstimator, SharedRate};
pub use upload::UploadTester;

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::{TransferProgress, TransferRunResult},
    types::TransferDirection,
};
use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Channel on which progress snapshots are published
pub type ProgressSender = mpsc::UnboundedSender<TransferProgress>;

/// Settings for one transfer phase
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Concurrent workers
    pub workers: usize,
    /// Wall-clock length of the test
    pub duration: Duration,
    /// Upload payload size per request; unused by downloads
    pub payload_size: usize,
    /// Download read granularity fed to the estimator
    pub chunk_size: usize,
    /// How long an in-flight request may continue after cancellation
    pub cancel_grace: Duration,
    /// Additional endpoints (download: cycled, upload: tried in order)
    pub fallback_urls: Vec<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: crate::defaults::DEFAULT_DOWNLOAD_WORKERS,
            duration: crate::defaults::DEFAULT_DOWNLOAD_DURATION,
            payload_size: crate::defaults::DEFAULT_UPLOAD_SIZE_BYTES,
            chunk_size: crate::defaults::DEFAULT_CHUNK_SIZE_BYTES,
            cancel_grace: crate::defaults::DEFAULT_CANCEL_GRACE,
            fallback_urls: Vec::new(),
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::validation("Transfer worker count must be greater than 0"));
        }
        if self.duration.is_zero() {
            return Err(AppError::validation("Transfer duration must be greater than 0"));
        }
        if self.chunk_size == 0 {
            return Err(AppError::validation("Chunk size must be greater than 0"));
        }
        Ok(())
    }
}

/// A throughput test against one server
#[async_trait]
pub trait TransferTester: Send + Sync {
    fn direction(&self) -> TransferDirection;

    /// Run until the configured duration elapses or `cancel` fires.
    ///
    /// Per-request failures never surface here; a server that never
    /// succeeds yields a result with zero bandwidth.
    async fn run(
        &self,
        base_url: &str,
        cancel: &CancellationToken,
        progress: Option<ProgressSender>,
    ) -> Result<TransferRunResult>;
}

/// Per-worker view of the shared run state
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub id: usize,
    pub token: CancellationToken,
    pub rate: Arc<SharedRate>,
    pub grace: Duration,
    pub logger: Logger,
}

impl WorkerContext {
    /// Whether the worker should stop before starting another request
    pub fn should_stop(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive one in-flight request; after cancellation it gets `grace`
    /// more time to finish before it is dropped and `None` is returned.
    pub async fn bounded<F: Future>(&self, operation: F) -> Option<F::Output> {
        let token = self.token.clone();
        let grace = self.grace;
        tokio::select! {
            biased;
            output = operation => Some(output),
            _ = async move {
                token.cancelled().await;
                tokio::time::sleep(grace).await;
            } => None,
        }
    }
}

/// Run `config.workers` copies of `worker` under a derived deadline.
pub(crate) async fn run_workers<F, Fut>(
    direction: TransferDirection,
    config: &TransferConfig,
    parent: &CancellationToken,
    progress: Option<ProgressSender>,
    logger: &Logger,
    worker: F,
) -> Result<TransferRunResult>
where
    F: Fn(WorkerContext) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    config.validate()?;

    let phase = direction.phase();
    let start = Instant::now();
    let token = parent.child_token();
    let rate = Arc::new(SharedRate::new(start));

    let deadline = {
        let token = token.clone();
        let duration = config.duration;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => token.cancel(),
                _ = token.cancelled() => {}
            }
        })
    };

    let ticker = progress.clone().map(|sender| {
        let token = token.clone();
        let rate = rate.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(crate::defaults::PROGRESS_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let (current, total) = rate.snapshot();
                        let snapshot = TransferProgress {
                            phase,
                            rate_bytes_per_sec: current,
                            bytes_total: total,
                            elapsed: start.elapsed(),
                        };
                        if sender.send(snapshot).is_err() {
                            break;
                        }
                    }
                }
            }
        })
    });

    logger.debug(&format!("Starting {} test", direction))
        .field("workers", config.workers)
        .field("duration_ms", config.duration.as_millis() as u64)
        .log()
        .await;

    let handles: Vec<_> = (0..config.workers)
        .map(|id| {
            tokio::spawn(worker(WorkerContext {
                id,
                token: token.clone(),
                rate: rate.clone(),
                grace: config.cancel_grace,
                logger: logger.clone(),
            }))
        })
        .collect();

    for joined in join_all(handles).await {
        if let Err(e) = joined {
            crate::log_warn!(logger, "{} worker ended abnormally: {}", direction, e);
        }
    }

    // Stop the deadline timer and the ticker
    token.cancel();
    let _ = deadline.await;
    if let Some(ticker) = ticker {
        let _ = ticker.await;
    }

    let elapsed = start.elapsed();
    let (current, total_bytes) = rate.snapshot();

    if let Some(sender) = progress {
        let _ = sender.send(TransferProgress {
            phase,
            rate_bytes_per_sec: current,
            bytes_total: total_bytes,
            elapsed,
        });
    }

    let result = TransferRunResult {
        bandwidth_bytes_per_sec: current.max(0.0).round() as u64,
        total_bytes,
        elapsed,
    };

    logger.debug(&format!("Finished {} test", direction))
        .transfer(&result)
        .field("cancelled_externally", parent.is_cancelled())
        .log()
        .await;

    Ok(result)
}
