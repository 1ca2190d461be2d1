//! Upload throughput test with a shared random payload

use super::{run_workers, ProgressSender, TransferConfig, TransferTester, WorkerContext};
use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::TransferRunResult,
    types::TransferDirection,
};
use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;
use reqwest::{header::CONTENT_TYPE, Client};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Upload URL on a server
pub fn upload_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), crate::defaults::UPLOAD_PATH)
}

/// Incompressible payload of `size` bytes
pub fn random_payload(size: usize) -> Bytes {
    let mut buf = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut buf);
    Bytes::from(buf)
}

/// Runs concurrent POSTs of one shared random payload
pub struct UploadTester {
    client: Client,
    config: TransferConfig,
    payload: Bytes,
    logger: Logger,
}

impl UploadTester {
    /// Create a tester; the payload is generated here, once
    pub fn new(client: Client, config: TransferConfig, logger: Logger) -> Self {
        let payload = random_payload(config.payload_size);
        Self { client, config, payload, logger }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Primary upload URL followed by fallbacks, tried in this order
    pub fn urls(&self, base_url: &str) -> Vec<String> {
        std::iter::once(upload_url(base_url))
            .chain(self.config.fallback_urls.iter().cloned())
            .collect()
    }
}

async fn upload_once(client: &Client, url: &str, payload: Bytes) -> Result<u64> {
    let size = payload.len() as u64;
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/octet-stream")
        .body(payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::http_request(format!("{} returned {}", url, status)));
    }
    Ok(size)
}

/// Try each URL in order; the first success wins
async fn upload_any(client: &Client, urls: &[String], payload: &Bytes) -> Result<u64> {
    let mut last_error = AppError::internal("no upload URLs configured");
    for url in urls {
        match upload_once(client, url, payload.clone()).await {
            Ok(size) => return Ok(size),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

async fn upload_worker(client: Client, urls: Arc<Vec<String>>, payload: Bytes, ctx: WorkerContext) {
    while !ctx.should_stop() {
        match ctx.bounded(upload_any(&client, &urls, &payload)).await {
            Some(Ok(bytes)) => {
                ctx.rate.record(bytes);
            }
            Some(Err(e)) => {
                ctx.logger.trace("upload failed")
                    .field("worker", ctx.id)
                    .field("error", e.to_string())
                    .log()
                    .await;
            }
            None => break,
        }
    }
}

#[async_trait]
impl TransferTester for UploadTester {
    fn direction(&self) -> TransferDirection {
        TransferDirection::Upload
    }

    async fn run(
        &self,
        base_url: &str,
        cancel: &CancellationToken,
        progress: Option<ProgressSender>,
    ) -> Result<TransferRunResult> {
        if self.payload.is_empty() {
            return Err(AppError::validation("Upload payload size must be greater than 0"));
        }

        let urls = Arc::new(self.urls(base_url));
        let client = self.client.clone();
        let payload = self.payload.clone();

        run_workers(
            TransferDirection::Upload,
            &self.config,
            cancel,
            progress,
            &self.logger,
            move |ctx| upload_worker(client.clone(), urls.clone(), payload.clone(), ctx),
        )
        .await
    }
}
