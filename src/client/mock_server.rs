//! Mock speed test server for controlled testing scenarios

use std::time::Duration;
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

/// Wiremock server exposing the `/speedtest/*` endpoint layout
pub struct MockSpeedServer {
    server: MockServer,
}

impl MockSpeedServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Base URL of the mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Latency endpoint answering with `status` after `delay`
    pub async fn mock_latency(&self, status: u16, delay: Option<Duration>) {
        let mut template = ResponseTemplate::new(status).set_body_string("test=test");
        if let Some(delay) = delay {
            template = template.set_delay(delay);
        }

        Mock::given(method("GET"))
            .and(path("/speedtest/latency.txt"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Latency endpoint that succeeds for the first `successes` requests and
    /// answers 500 afterwards
    pub async fn mock_latency_limited(&self, successes: u64) {
        Mock::given(method("GET"))
            .and(path("/speedtest/latency.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("test=test"))
            .up_to_n_times(successes)
            .with_priority(1)
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/speedtest/latency.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
    }

    /// Every `random{W}x{H}.jpg` variant serves `body_size` bytes
    pub async fn mock_download(&self, body_size: usize, delay: Option<Duration>) {
        let mut template = ResponseTemplate::new(200)
            .set_body_bytes(vec![0xA5u8; body_size])
            .insert_header("content-type", "image/jpeg");
        if let Some(delay) = delay {
            template = template.set_delay(delay);
        }

        Mock::given(method("GET"))
            .and(path_regex(r"^/speedtest/random\d+x\d+\.jpg$"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Upload endpoint accepting octet-stream POSTs with `status`
    pub async fn mock_upload(&self, status: u16, delay: Option<Duration>) {
        let mut template = ResponseTemplate::new(status).set_body_string("size=0");
        if let Some(delay) = delay {
            template = template.set_delay(delay);
        }

        Mock::given(method("POST"))
            .and(path("/speedtest/upload.php"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Every endpoint fails with 500
    pub async fn mock_all_errors(&self) {
        Mock::given(path_regex(r"^/speedtest/.*$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
    }

    /// A fully working server
    pub async fn mock_healthy(&self, download_size: usize) {
        self.mock_latency(200, Some(Duration::from_millis(2))).await;
        self.mock_download(download_size, None).await;
        self.mock_upload(200, None).await;
    }
}
