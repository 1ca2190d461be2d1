//! Network Speed Tester
//!
//! Measures latency, download and upload throughput against HTTP speed test
//! servers. The nearest servers are ranked by latency probing, then
//! time-boxed multi-worker transfers are run against the winner under a
//! single cancellable deadline.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod latency;
pub mod location;
pub mod logging;
pub mod models;
pub mod output;
pub mod server;
pub mod stats;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{TestOrchestrator, TestRunner};
pub use latency::{LatencyProbe, ProbeConfig};
pub use location::{HttpLocationService, LocationService};
pub use models::{AggregateResult, CandidateServer, Config, LatencyStat, TransferProgress, TransferRunResult, UserLocation};
pub use output::{ColoredFormatter, JsonFormatter, OutputFormatter, PlainFormatter, ProgressReporter};
pub use server::{distance_km, HttpServerDirectory, ServerDirectory, ServerRanker};
pub use transfer::{DownloadTester, RateEstimator, SharedRate, TransferConfig, UploadTester};
pub use types::{Phase, SpeedUnit, TransferDirection};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// `--version` text with the build metadata embedded by build.rs
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT"),
    "\nbuilt: ",
    env!("BUILD_TIME"),
    "\ntarget: ",
    env!("TARGET_TRIPLE"),
);

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_SERVERS_TO_PROBE: usize = 5;

    pub const DEFAULT_LATENCY_SAMPLES: usize = 5;
    pub const DEFAULT_LATENCY_SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_LATENCY_CONCURRENCY: usize = 3;
    pub const DEFAULT_RANKING_SAMPLES: usize = 3;
    pub const DEFAULT_RANKING_PARALLEL_SERVERS: usize = 3;

    pub const DEFAULT_DOWNLOAD_WORKERS: usize = 4;
    pub const DEFAULT_DOWNLOAD_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_UPLOAD_WORKERS: usize = 2;
    pub const DEFAULT_UPLOAD_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_UPLOAD_SIZE_BYTES: usize = 10 * 1024 * 1024;
    pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 32 * 1024;
    pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(1);
    pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

    /// EWMA weight given to each new throughput sample
    pub const RATE_SMOOTHING_FACTOR: f64 = 0.1;

    /// Square image sizes served by `/speedtest/random{W}x{H}.jpg`
    pub const DOWNLOAD_SIZE_LADDER: &[u32] = &[350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500];

    pub const LATENCY_PATH: &str = "/speedtest/latency.txt";
    pub const UPLOAD_PATH: &str = "/speedtest/upload.php";

    pub const DEFAULT_LOCATION_URL: &str = "https://ipinfo.io/json";
    pub const DEFAULT_DIRECTORY_URL: &str = "https://www.speedtest.net/api/js/servers?engine=js&limit=10";

    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
