//! Streamed download throughput test

use super::{run_workers, ProgressSender, TransferConfig, TransferTester, WorkerContext};
use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::TransferRunResult,
    types::TransferDirection,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Download URL for one rung of the size ladder
pub fn download_url(base_url: &str, size: u32) -> String {
    format!(
        "{}/speedtest/random{}x{}.jpg",
        base_url.trim_end_matches('/'),
        size,
        size
    )
}

/// Runs concurrent streamed GETs over the size ladder
pub struct DownloadTester {
    client: Client,
    config: TransferConfig,
    logger: Logger,
}

impl DownloadTester {
    pub fn new(client: Client, config: TransferConfig, logger: Logger) -> Self {
        Self { client, config, logger }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Ladder URLs for `base_url` followed by any fallback URLs
    pub fn urls(&self, base_url: &str) -> Vec<String> {
        crate::defaults::DOWNLOAD_SIZE_LADDER
            .iter()
            .map(|size| download_url(base_url, *size))
            .chain(self.config.fallback_urls.iter().cloned())
            .collect()
    }
}

/// Stream one response, feeding the estimator every `chunk_size` bytes.
/// Returns the number of body bytes read.
async fn download_once(
    client: &Client,
    url: &str,
    ctx: &WorkerContext,
    chunk_size: usize,
) -> Result<u64> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::http_request(format!("{} returned {}", url, status)));
    }

    let chunk_size = chunk_size as u64;
    let mut stream = response.bytes_stream();
    let mut unreported = 0u64;
    let mut received = 0u64;

    while let Some(frame) = stream.next().await {
        let frame = frame?;
        received += frame.len() as u64;
        unreported += frame.len() as u64;

        if unreported >= chunk_size {
            let whole = unreported - unreported % chunk_size;
            ctx.rate.record(whole);
            unreported -= whole;
        }
    }

    if unreported > 0 {
        ctx.rate.record(unreported);
    }

    Ok(received)
}

async fn download_worker(client: Client, urls: Arc<Vec<String>>, chunk_size: usize, ctx: WorkerContext) {
    let mut iteration = 0usize;

    while !ctx.should_stop() {
        let url = &urls[(ctx.id + iteration) % urls.len()];
        iteration += 1;

        match ctx.bounded(download_once(&client, url, &ctx, chunk_size)).await {
            Some(Ok(bytes)) => {
                ctx.logger.trace("download complete")
                    .field("worker", ctx.id)
                    .field("url", url)
                    .field("bytes", bytes)
                    .log()
                    .await;
            }
            Some(Err(e)) => {
                ctx.logger.trace("download failed")
                    .field("worker", ctx.id)
                    .field("url", url)
                    .field("error", e.to_string())
                    .log()
                    .await;
            }
            None => break,
        }
    }
}

#[async_trait]
impl TransferTester for DownloadTester {
    fn direction(&self) -> TransferDirection {
        TransferDirection::Download
    }

    async fn run(
        &self,
        base_url: &str,
        cancel: &CancellationToken,
        progress: Option<ProgressSender>,
    ) -> Result<TransferRunResult> {
        let urls = Arc::new(self.urls(base_url));
        let chunk_size = self.config.chunk_size;
        let client = self.client.clone();

        run_workers(
            TransferDirection::Download,
            &self.config,
            cancel,
            progress,
            &self.logger,
            move |ctx| download_worker(client.clone(), urls.clone(), chunk_size, ctx),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{mock_server::MockSpeedServer, ClientFactory};
    use std::time::{Duration, Instant};

    fn tester(workers: usize, duration: Duration) -> DownloadTester {
        let config = TransferConfig {
            workers,
            duration,
            cancel_grace: Duration::from_millis(500),
            ..TransferConfig::default()
        };
        let client = ClientFactory::default().download_client().unwrap();
        DownloadTester::new(client, config, Logger::quiet("DOWNLOAD"))
    }

    #[test]
    fn test_download_url_pattern() {
        assert_eq!(
            download_url("http://host:8080/", 750),
            "http://host:8080/speedtest/random750x750.jpg"
        );
    }

    #[test]
    fn test_urls_include_ladder_then_fallbacks() {
        let mut t = tester(1, Duration::from_secs(1));
        t.config.fallback_urls = vec!["http://cdn.example.com/file.bin".to_string()];

        let urls = t.urls("http://host");
        assert_eq!(urls.len(), crate::defaults::DOWNLOAD_SIZE_LADDER.len() + 1);
        assert_eq!(urls[0], "http://host/speedtest/random350x350.jpg");
        assert_eq!(urls.last().unwrap(), "http://cdn.example.com/file.bin");
    }

    #[tokio::test]
    async fn test_download_measures_positive_bandwidth() {
        let server = MockSpeedServer::start().await;
        server.mock_download(256 * 1024, None).await;

        let token = CancellationToken::new();
        let result = tester(2, Duration::from_millis(800))
            .run(&server.url(), &token, None)
            .await
            .unwrap();

        assert!(result.total_bytes >= 256 * 1024);
        assert!(result.bandwidth_bytes_per_sec > 0);
        assert!(result.elapsed >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_server_errors_yield_zero_bandwidth() {
        let server = MockSpeedServer::start().await;
        server.mock_all_errors().await;

        let token = CancellationToken::new();
        let result = tester(2, Duration::from_millis(500))
            .run(&server.url(), &token, None)
            .await
            .unwrap();

        assert_eq!(result.total_bytes, 0);
        assert_eq!(result.bandwidth_bytes_per_sec, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_zero_bandwidth() {
        let token = CancellationToken::new();
        let result = tester(1, Duration::from_millis(300))
            .run("http://127.0.0.1:9", &token, None)
            .await
            .unwrap();

        assert_eq!(result.bandwidth_bytes_per_sec, 0);
    }

    #[tokio::test]
    async fn test_cancellation_returns_promptly() {
        let server = MockSpeedServer::start().await;
        // Responses stall far longer than the grace period
        server.mock_download(1024, Some(Duration::from_secs(20))).await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let begin = Instant::now();
        let result = tester(4, Duration::from_secs(30))
            .run(&server.url(), &token, None)
            .await
            .unwrap();

        assert!(begin.elapsed() < Duration::from_secs(2), "took {:?}", begin.elapsed());
        assert_eq!(result.total_bytes, 0);
    }
}
